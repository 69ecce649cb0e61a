use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::cancel::finalize_cancellation;
use crate::error::AppError;
use crate::models::events::{CancelReason, OfferEvent};
use crate::models::offer::{DeliveryOffer, DeliveryStatus};
use crate::state::AppState;

/// The acceptance arbiter: the single serialization point deciding which
/// rider gets a delivery. The whole claim runs inside one row guard on the
/// offer, so of N concurrent calls exactly one observes `Pending` and
/// wins; every later caller deterministically sees the rider already set.
pub fn accept_offer(
    state: &AppState,
    rider_id: Uuid,
    order_item_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DeliveryOffer, AppError> {
    let result = try_accept(state, rider_id, order_item_id, now);

    let outcome = match &result {
        Ok(_) => "won",
        Err(err) => err.code(),
    };
    state
        .metrics
        .accepts_total
        .with_label_values(&[outcome])
        .inc();

    result
}

fn try_accept(
    state: &AppState,
    rider_id: Uuid,
    order_item_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DeliveryOffer, AppError> {
    {
        let rider = state
            .riders
            .get(&rider_id)
            .ok_or_else(|| AppError::NotFound(format!("rider {rider_id} not found")))?;
        if !rider.can_accept(now) {
            return Err(AppError::IneligibleState(
                "rider is offline or suspended".to_string(),
            ));
        }
    }

    let offer_id = *state
        .offers_by_item
        .get(&order_item_id)
        .ok_or_else(|| AppError::NotFound(format!("no offer for order item {order_item_id}")))?;

    let claimed = {
        let mut offer = state
            .offers
            .get_mut(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        if offer.rider_id.is_some() {
            return Err(AppError::AlreadyAccepted);
        }
        if offer.status != DeliveryStatus::Pending {
            return Err(AppError::NotAvailable);
        }
        if now > offer.offer_expires_at {
            // Lazy expiry: no sweeper ran, but the claim must still fail.
            offer.status = DeliveryStatus::Cancelled;
            let expired = offer.clone();
            drop(offer);
            finalize_cancellation(state, &expired, CancelReason::OfferExpired);
            return Err(AppError::Expired);
        }

        debug_assert!(offer.status.can_transition(DeliveryStatus::Assigned));
        offer.status = DeliveryStatus::Assigned;
        offer.rider_id = Some(rider_id);
        offer.accepted_at = Some(now);
        offer.attempts = 0;
        offer.pickup_deadline = Some(now + state.settings.pickup_window());
        offer.delivery_deadline = Some(now + state.settings.delivery_window());
        // Assigned is transitional; the claim settles at ReadyForPickup
        // before the row guard is released.
        debug_assert!(offer.status.can_transition(DeliveryStatus::ReadyForPickup));
        offer.status = DeliveryStatus::ReadyForPickup;
        offer.clone()
    };

    let waited = (now - claimed.created_at).num_milliseconds().max(0) as f64 / 1_000.0;
    state.metrics.offer_time_to_accept_seconds.observe(waited);

    info!(
        offer_id = %claimed.id,
        rider_id = %rider_id,
        order_item_id = %order_item_id,
        "offer accepted"
    );

    // Post-commit, best-effort: tell the seller and the winning rider.
    state.publish_event(OfferEvent::Assigned {
        offer_id: claimed.id,
        order_item_id,
        rider_id,
        pickup_deadline: claimed.pickup_deadline.unwrap_or(now),
        delivery_deadline: claimed.delivery_deadline.unwrap_or(now),
    });

    Ok(claimed)
}
