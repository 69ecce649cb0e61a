use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::cancel::finalize_cancellation;
use crate::engine::codes;
use crate::error::AppError;
use crate::models::events::{CancelReason, OfferEvent};
use crate::models::offer::{DeliveryOffer, DeliveryStatus};
use crate::state::AppState;

/// Which handoff a submitted code is meant to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pickup,
    Delivery,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Pickup => "pickup",
            Phase::Delivery => "delivery",
        }
    }
}

/// Seller hands the package over: the rider submits the seller's pickup
/// code. On match the offer advances to `OutForDelivery`; the code cannot
/// trigger the transition twice because the state has moved on.
pub fn verify_pickup(
    state: &AppState,
    offer_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
) -> Result<DeliveryOffer, AppError> {
    verify(state, offer_id, code, now, Phase::Pickup)
}

/// Buyer receives the package: the rider submits the buyer's delivery
/// code. On match the offer reaches `Delivered` and `delivered_at` is
/// stamped.
pub fn verify_delivery(
    state: &AppState,
    offer_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
) -> Result<DeliveryOffer, AppError> {
    verify(state, offer_id, code, now, Phase::Delivery)
}

fn verify(
    state: &AppState,
    offer_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
    phase: Phase,
) -> Result<DeliveryOffer, AppError> {
    let result = try_verify(state, offer_id, code, now, phase);

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.code(),
    };
    state
        .metrics
        .code_verifications_total
        .with_label_values(&[phase.label(), outcome])
        .inc();

    result
}

fn try_verify(
    state: &AppState,
    offer_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
    phase: Phase,
) -> Result<DeliveryOffer, AppError> {
    enum Settled {
        Advanced(DeliveryOffer),
        Expired(DeliveryOffer, CancelReason),
        Rejected(DeliveryOffer),
    }

    let settled = {
        let mut offer = state
            .offers
            .get_mut(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        let expected = match phase {
            Phase::Pickup => DeliveryStatus::ReadyForPickup,
            Phase::Delivery => DeliveryStatus::OutForDelivery,
        };
        if offer.status != expected {
            return Err(AppError::NotAvailable);
        }

        // Lazy deadline enforcement: acting past the relevant deadline
        // fails with Expired and cancels the offer as a side effect.
        let deadline_passed = match phase {
            Phase::Pickup => {
                now > offer.pickup_code_expires
                    || offer.pickup_deadline.is_some_and(|d| now > d)
            }
            Phase::Delivery => offer.delivery_deadline.is_some_and(|d| now > d),
        };
        if deadline_passed {
            offer.status = DeliveryStatus::Cancelled;
            let reason = match phase {
                Phase::Pickup => CancelReason::PickupDeadline,
                Phase::Delivery => CancelReason::DeliveryDeadline,
            };
            Settled::Expired(offer.clone(), reason)
        } else {
            let (salt, stored_hash) = match phase {
                Phase::Pickup => (&offer.pickup_code_salt, &offer.pickup_code_hash),
                Phase::Delivery => (&offer.delivery_code_salt, &offer.delivery_code_hash),
            };

            if !codes::verify(code, salt, stored_hash) {
                offer.attempts += 1;
                if offer.attempts >= state.settings.max_code_attempts {
                    // Lockout: too many wrong codes voids the offer.
                    offer.status = DeliveryStatus::Cancelled;
                    Settled::Expired(offer.clone(), CancelReason::CodeAttemptsExhausted)
                } else {
                    Settled::Rejected(offer.clone())
                }
            } else {
                let next = match phase {
                    Phase::Pickup => DeliveryStatus::OutForDelivery,
                    Phase::Delivery => DeliveryStatus::Delivered,
                };
                debug_assert!(offer.status.can_transition(next));
                offer.status = next;
                // Each handoff phase gets the full attempt budget.
                offer.attempts = 0;
                if phase == Phase::Delivery {
                    offer.delivered_at = Some(now);
                }
                Settled::Advanced(offer.clone())
            }
        }
    };

    match settled {
        Settled::Advanced(offer) => {
            info!(offer_id = %offer.id, phase = phase.label(), "handoff code verified");
            let rider_id = offer.rider_id.unwrap_or_default();
            match phase {
                Phase::Pickup => {
                    state.publish_event(OfferEvent::PickedUp {
                        offer_id: offer.id,
                        rider_id,
                    });
                }
                Phase::Delivery => {
                    state.metrics.offers_open.dec();
                    state.publish_event(OfferEvent::Delivered {
                        offer_id: offer.id,
                        rider_id,
                        delivered_at: now,
                    });
                }
            }
            Ok(offer)
        }
        Settled::Expired(offer, reason) => {
            finalize_cancellation(state, &offer, reason);
            Err(AppError::Expired)
        }
        Settled::Rejected(offer) => {
            warn!(
                offer_id = %offer.id,
                phase = phase.label(),
                attempts = offer.attempts,
                "wrong handoff code"
            );
            Err(AppError::InvalidCode)
        }
    }
}
