use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::offer::{DeliveryOffer, DeliveryStatus};
use crate::models::GeoPoint;

/// The fulfillment unit an offer covers. Denormalized with the store and
/// buyer fields the offer broadcast needs; the wider order system owns the
/// rest of the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Only items of paid orders are dispatchable.
    pub paid: bool,
    pub item_name: String,
    pub price: f64,
    pub store_name: String,
    pub pickup_address: String,
    pub buyer_name: String,
    pub buyer_contact: String,
    pub dropoff: GeoPoint,
    pub dropoff_address: String,
    pub created_at: DateTime<Utc>,
}

/// Coarse delivery status shown on the order item. Not stored: recomputed
/// from the item's active offer on every read, so it cannot diverge from
/// the offer state machine.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ItemDeliveryStatus {
    Pending,
    ReadyForPickup,
    Assigned,
    OutForDelivery,
    Delivered,
}

impl ItemDeliveryStatus {
    pub fn project(offer: Option<&DeliveryOffer>) -> Self {
        match offer.map(|o| o.status) {
            None => ItemDeliveryStatus::Pending,
            Some(DeliveryStatus::Pending) => ItemDeliveryStatus::ReadyForPickup,
            Some(DeliveryStatus::Assigned | DeliveryStatus::ReadyForPickup) => {
                ItemDeliveryStatus::Assigned
            }
            Some(DeliveryStatus::OutForDelivery) => ItemDeliveryStatus::OutForDelivery,
            Some(DeliveryStatus::Delivered) => ItemDeliveryStatus::Delivered,
            // A cancelled offer frees the item for re-dispatch.
            Some(DeliveryStatus::Cancelled) => ItemDeliveryStatus::Pending,
        }
    }

    /// Eligible for `markReady` (initial dispatch or idempotent retry).
    pub fn dispatchable(self) -> bool {
        matches!(
            self,
            ItemDeliveryStatus::Pending | ItemDeliveryStatus::ReadyForPickup
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::ItemDeliveryStatus;
    use crate::models::offer::{DeliveryOffer, DeliveryStatus};
    use crate::models::GeoPoint;

    fn offer_with(status: DeliveryStatus) -> DeliveryOffer {
        DeliveryOffer {
            id: Uuid::new_v4(),
            order_item_id: Uuid::new_v4(),
            status,
            rider_id: None,
            seller_location: GeoPoint { lat: 6.5, lng: 3.4 },
            seller_geohash: "s14k".to_string(),
            offer_expires_at: Utc::now(),
            pickup_deadline: None,
            delivery_deadline: None,
            pickup_code_expires: Utc::now(),
            pickup_code_hash: String::new(),
            pickup_code_salt: String::new(),
            delivery_code_hash: String::new(),
            delivery_code_salt: String::new(),
            rider_earnings: 0.0,
            accepted_at: None,
            delivered_at: None,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn projection_tracks_offer_status() {
        assert_eq!(ItemDeliveryStatus::project(None), ItemDeliveryStatus::Pending);
        assert_eq!(
            ItemDeliveryStatus::project(Some(&offer_with(DeliveryStatus::Pending))),
            ItemDeliveryStatus::ReadyForPickup
        );
        assert_eq!(
            ItemDeliveryStatus::project(Some(&offer_with(DeliveryStatus::ReadyForPickup))),
            ItemDeliveryStatus::Assigned
        );
        assert_eq!(
            ItemDeliveryStatus::project(Some(&offer_with(DeliveryStatus::OutForDelivery))),
            ItemDeliveryStatus::OutForDelivery
        );
        assert_eq!(
            ItemDeliveryStatus::project(Some(&offer_with(DeliveryStatus::Delivered))),
            ItemDeliveryStatus::Delivered
        );
    }

    #[test]
    fn cancelled_offer_frees_the_item() {
        let projected = ItemDeliveryStatus::project(Some(&offer_with(DeliveryStatus::Cancelled)));
        assert_eq!(projected, ItemDeliveryStatus::Pending);
        assert!(projected.dispatchable());
    }
}
