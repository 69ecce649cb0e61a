use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::GeoPoint;

/// Lifecycle of a delivery offer. Transitions are forward-only; `Assigned`
/// is a transitional state the acceptance path passes through inside one
/// row guard, so it is never observed at rest.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn can_transition(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, next) {
            (Pending, Assigned) => true,
            (Assigned, ReadyForPickup) => true,
            (ReadyForPickup, OutForDelivery) => true,
            (OutForDelivery, Delivered) => true,
            // Any pre-terminal state may cancel (expiry or explicit).
            (Pending | Assigned | ReadyForPickup | OutForDelivery, Cancelled) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Claimed by a rider and still in flight.
    pub fn is_claimed(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned
                | DeliveryStatus::ReadyForPickup
                | DeliveryStatus::OutForDelivery
        )
    }
}

/// The unit of dispatch. Secret material (code hashes and salts) is never
/// serialized; every representation leaving the core is redacted.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOffer {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub status: DeliveryStatus,
    /// Set exactly once, at acceptance; never reassigned.
    pub rider_id: Option<Uuid>,
    pub seller_location: GeoPoint,
    /// Precision-4 pickup bucket.
    pub seller_geohash: String,
    pub offer_expires_at: DateTime<Utc>,
    pub pickup_deadline: Option<DateTime<Utc>>,
    pub delivery_deadline: Option<DateTime<Utc>>,
    pub pickup_code_expires: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub pickup_code_hash: String,
    #[serde(skip_serializing)]
    pub pickup_code_salt: String,
    #[serde(skip_serializing)]
    pub delivery_code_hash: String,
    #[serde(skip_serializing)]
    pub delivery_code_salt: String,
    /// Computed once at creation, immutable afterward.
    pub rider_earnings: f64,
    pub accepted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Failed code submissions in the current handoff phase; reset to zero
    /// when the offer advances to the next phase.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl DeliveryOffer {
    /// Active offers block creation of a second offer for the same item.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn transitions_are_forward_only() {
        assert!(Pending.can_transition(Assigned));
        assert!(Assigned.can_transition(ReadyForPickup));
        assert!(ReadyForPickup.can_transition(OutForDelivery));
        assert!(OutForDelivery.can_transition(Delivered));

        assert!(!ReadyForPickup.can_transition(Pending));
        assert!(!OutForDelivery.can_transition(ReadyForPickup));
        assert!(!Pending.can_transition(ReadyForPickup)); // must pass Assigned
        assert!(!ReadyForPickup.can_transition(Delivered)); // no skipping pickup
    }

    #[test]
    fn terminal_states_absorb() {
        for next in [Pending, Assigned, ReadyForPickup, OutForDelivery, Delivered, Cancelled] {
            assert!(!Delivered.can_transition(next));
            assert!(!Cancelled.can_transition(next));
        }
    }

    #[test]
    fn every_pre_terminal_state_can_cancel() {
        for state in [Pending, Assigned, ReadyForPickup, OutForDelivery] {
            assert!(state.can_transition(Cancelled));
        }
    }
}
