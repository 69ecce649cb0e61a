use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::engine::cancel::finalize_cancellation;
use crate::engine::codes;
use crate::error::AppError;
use crate::geo;
use crate::models::events::{CancelReason, OfferBroadcast, OfferEvent};
use crate::models::offer::{DeliveryOffer, DeliveryStatus};
use crate::models::GeoPoint;
use crate::state::AppState;

/// A freshly opened offer together with its plaintext handoff codes. The
/// codes exist only in this value and in the one-shot notification events;
/// the offer itself stores hashes.
#[derive(Debug)]
pub struct NewOffer {
    pub offer: DeliveryOffer,
    pub pickup_code: String,
    pub delivery_code: String,
}

/// `markReady` outcome: either a new offer was opened, or an open offer
/// for the same item already existed and is returned unchanged.
#[derive(Debug)]
pub enum OfferOutcome {
    Created(NewOffer),
    Existing(DeliveryOffer),
}

impl OfferOutcome {
    pub fn offer(&self) -> &DeliveryOffer {
        match self {
            OfferOutcome::Created(new) => &new.offer,
            OfferOutcome::Existing(offer) => offer,
        }
    }
}

/// Seller marked an order item ready for pickup: open a time-boxed offer
/// and broadcast it to nearby rider zones.
///
/// Idempotent per order item: a second call while an unaccepted offer is
/// open returns that offer. An item whose offer is already claimed is not
/// eligible; a terminal (delivered/cancelled) offer no longer blocks a new
/// one, and a pending offer nobody accepted within its window is cancelled
/// here and replaced. The index entry guard makes creation atomic, so two
/// concurrent calls can never open two active offers for one item.
pub fn create_offer(
    state: &AppState,
    order_item_id: Uuid,
    lat: f64,
    lng: f64,
    now: DateTime<Utc>,
) -> Result<OfferOutcome, AppError> {
    geo::validate(lat, lng)?;

    let item = state
        .order_items
        .get(&order_item_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order item {order_item_id} not found")))?;

    if !item.paid {
        return Err(AppError::IneligibleState(
            "order item belongs to an unpaid order".to_string(),
        ));
    }

    let new_offer;
    {
        let mut index = state.offers_by_item.entry(order_item_id).or_default();
        let stale_id = match state.offers.get(index.value()) {
            Some(existing) => {
                let existing = existing.value();
                if !existing.is_active() {
                    // Terminal offer in the index: the item is free for
                    // re-dispatch.
                    None
                } else if existing.status != DeliveryStatus::Pending {
                    return Err(AppError::IneligibleState(
                        "delivery already claimed by a rider".to_string(),
                    ));
                } else if now > existing.offer_expires_at {
                    // Nobody accepted within the window: the offer is dead,
                    // cancel it under the same guard and open a fresh one
                    // instead of handing back a non-dispatchable offer.
                    Some(existing.id)
                } else {
                    return Ok(OfferOutcome::Existing(existing.clone()));
                }
            }
            None => None,
        };
        if let Some(stale_id) = stale_id {
            let expired = {
                let mut stale = state
                    .offers
                    .get_mut(&stale_id)
                    .ok_or_else(|| AppError::Internal("offer vanished mid-update".to_string()))?;
                stale.status = DeliveryStatus::Cancelled;
                stale.clone()
            };
            finalize_cancellation(state, &expired, CancelReason::OfferExpired);
        }

        let pickup_code = codes::generate();
        let pickup_salt = codes::generate_salt();
        let delivery_code = codes::generate();
        let delivery_salt = codes::generate_salt();

        let offer = DeliveryOffer {
            id: Uuid::new_v4(),
            order_item_id,
            status: DeliveryStatus::Pending,
            rider_id: None,
            seller_location: GeoPoint { lat, lng },
            seller_geohash: geo::encode(lat, lng, geo::OFFER_CELL_PRECISION),
            offer_expires_at: now + state.settings.offer_ttl(),
            pickup_deadline: None,
            delivery_deadline: None,
            pickup_code_expires: now + state.settings.pickup_code_ttl(),
            pickup_code_hash: codes::hash(&pickup_code, &pickup_salt),
            pickup_code_salt: pickup_salt,
            delivery_code_hash: codes::hash(&delivery_code, &delivery_salt),
            delivery_code_salt: delivery_salt,
            rider_earnings: rider_earnings(item.price, state),
            accepted_at: None,
            delivered_at: None,
            attempts: 0,
            created_at: now,
        };

        state.offers.insert(offer.id, offer.clone());
        *index.value_mut() = offer.id;

        new_offer = NewOffer {
            offer,
            pickup_code,
            delivery_code,
        };
    }

    state.metrics.offers_created_total.inc();
    state.metrics.offers_open.inc();

    let offer = &new_offer.offer;
    info!(
        offer_id = %offer.id,
        order_item_id = %order_item_id,
        geohash = %offer.seller_geohash,
        earnings = offer.rider_earnings,
        "offer opened"
    );

    // Post-commit, best-effort: one-shot plaintext code handoff to the
    // notification collaborator, then the redacted zone broadcast.
    state.publish_event(OfferEvent::PickupCodeIssued {
        offer_id: offer.id,
        order_item_id,
        code: new_offer.pickup_code.clone(),
    });
    state.publish_event(OfferEvent::DeliveryCodeIssued {
        offer_id: offer.id,
        order_item_id,
        code: new_offer.delivery_code.clone(),
    });

    let payload = OfferBroadcast::build(offer, &item);
    let cells = geo::broadcast_cells(lat, lng);
    state.zones.publish(&cells, &payload);

    Ok(OfferOutcome::Created(new_offer))
}

/// Base pay + bonus + revenue share of the item price, rounded to cents.
/// Computed once at creation and immutable afterward.
pub fn rider_earnings(item_price: f64, state: &AppState) -> f64 {
    let s = &state.settings;
    let raw = s.base_pay + s.bonus + item_price * s.earnings_rate;
    (raw * 100.0).round() / 100.0
}
