use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::offer::DeliveryOffer;
use crate::models::order::OrderItem;
use crate::models::GeoPoint;

/// The redacted offer payload published to zone topics. Built from the
/// offer and its order item; carries no code or hash fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferBroadcast {
    pub offer_id: Uuid,
    pub order_item_id: Uuid,
    pub store_name: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    /// Rider payout for this delivery.
    pub fee: f64,
    pub item_name: String,
    pub buyer_name: String,
    pub buyer_contact: String,
    pub seller_lat: f64,
    pub seller_lng: f64,
    pub buyer_lat: f64,
    pub buyer_lng: f64,
    pub geohash: String,
    pub expires_at: DateTime<Utc>,
}

impl OfferBroadcast {
    pub fn build(offer: &DeliveryOffer, item: &OrderItem) -> Self {
        let GeoPoint { lat: seller_lat, lng: seller_lng } = offer.seller_location;
        let GeoPoint { lat: buyer_lat, lng: buyer_lng } = item.dropoff;
        Self {
            offer_id: offer.id,
            order_item_id: offer.order_item_id,
            store_name: item.store_name.clone(),
            pickup_address: item.pickup_address.clone(),
            dropoff_address: item.dropoff_address.clone(),
            fee: offer.rider_earnings,
            item_name: item.item_name.clone(),
            buyer_name: item.buyer_name.clone(),
            buyer_contact: item.buyer_contact.clone(),
            seller_lat,
            seller_lng,
            buyer_lat,
            buyer_lng,
            geohash: offer.seller_geohash.clone(),
            expires_at: offer.offer_expires_at,
        }
    }
}

/// Reason an offer was cancelled, carried on the cancellation event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CancelReason {
    OfferExpired,
    PickupDeadline,
    DeliveryDeadline,
    CodeAttemptsExhausted,
    Explicit,
}

/// Post-commit lifecycle notifications. Published best-effort after the
/// state change has committed; delivery failure never rolls anything back.
/// The code-issued variants model the out-of-scope one-shot notification
/// channel to the seller/buyer and are the only place plaintext codes
/// travel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfferEvent {
    PickupCodeIssued {
        offer_id: Uuid,
        order_item_id: Uuid,
        code: String,
    },
    DeliveryCodeIssued {
        offer_id: Uuid,
        order_item_id: Uuid,
        code: String,
    },
    Assigned {
        offer_id: Uuid,
        order_item_id: Uuid,
        rider_id: Uuid,
        pickup_deadline: DateTime<Utc>,
        delivery_deadline: DateTime<Utc>,
    },
    PickedUp {
        offer_id: Uuid,
        rider_id: Uuid,
    },
    Delivered {
        offer_id: Uuid,
        rider_id: Uuid,
        delivered_at: DateTime<Utc>,
    },
    Cancelled {
        offer_id: Uuid,
        order_item_id: Uuid,
        reason: CancelReason,
    },
}
