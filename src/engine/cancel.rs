use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::events::{CancelReason, OfferEvent};
use crate::models::offer::{DeliveryOffer, DeliveryStatus};
use crate::state::AppState;

/// Explicit seller/admin cancellation. Idempotent: cancelling an offer
/// already in a terminal state returns it unchanged.
pub fn cancel_offer(
    state: &AppState,
    offer_id: Uuid,
    reason: CancelReason,
) -> Result<DeliveryOffer, AppError> {
    let cancelled = {
        let mut offer = state
            .offers
            .get_mut(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        if offer.status.is_terminal() {
            return Ok(offer.clone());
        }

        offer.status = DeliveryStatus::Cancelled;
        offer.clone()
    };

    finalize_cancellation(state, &cancelled, reason);
    Ok(cancelled)
}

/// Post-guard bookkeeping shared by every cancellation path, including the
/// lazy-expiry paths inside accept/verify: metrics, log line, event.
pub(crate) fn finalize_cancellation(state: &AppState, offer: &DeliveryOffer, reason: CancelReason) {
    state.metrics.offers_open.dec();
    info!(offer_id = %offer.id, ?reason, "offer cancelled");
    state.publish_event(OfferEvent::Cancelled {
        offer_id: offer.id,
        order_item_id: offer.order_item_id,
        reason,
    });
}
