use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::offer::create_offer;
use crate::error::AppError;
use crate::geo;
use crate::models::offer::DeliveryOffer;
use crate::models::order::{ItemDeliveryStatus, OrderItem};
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/order-items", post(create_order_item))
        .route("/order-items/:id", get(get_order_item))
        .route("/order-items/:id/ready", post(mark_ready))
}

#[derive(Deserialize)]
pub struct CreateOrderItemRequest {
    pub order_id: Uuid,
    pub paid: bool,
    pub item_name: String,
    pub price: f64,
    pub store_name: String,
    pub pickup_address: String,
    pub buyer_name: String,
    pub buyer_contact: String,
    pub dropoff: GeoPoint,
    pub dropoff_address: String,
}

#[derive(Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    /// Projection of the item's latest offer, recomputed on every read.
    pub delivery_status: ItemDeliveryStatus,
}

#[derive(Deserialize)]
pub struct MarkReadyRequest {
    pub lat: f64,
    pub lng: f64,
}

async fn create_order_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderItemRequest>,
) -> Result<Json<OrderItemView>, AppError> {
    if payload.item_name.trim().is_empty() {
        return Err(AppError::BadRequest("item_name cannot be empty".to_string()));
    }
    if !payload.price.is_finite() || payload.price < 0.0 {
        return Err(AppError::BadRequest("price must be non-negative".to_string()));
    }
    geo::validate(payload.dropoff.lat, payload.dropoff.lng)?;

    let item = OrderItem {
        id: Uuid::new_v4(),
        order_id: payload.order_id,
        paid: payload.paid,
        item_name: payload.item_name,
        price: payload.price,
        store_name: payload.store_name,
        pickup_address: payload.pickup_address,
        buyer_name: payload.buyer_name,
        buyer_contact: payload.buyer_contact,
        dropoff: payload.dropoff,
        dropoff_address: payload.dropoff_address,
        created_at: Utc::now(),
    };

    state.order_items.insert(item.id, item.clone());
    Ok(Json(OrderItemView {
        item,
        delivery_status: ItemDeliveryStatus::Pending,
    }))
}

async fn get_order_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderItemView>, AppError> {
    let item = state
        .order_items
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order item {id} not found")))?;

    let offer = state.latest_offer_for_item(id);
    Ok(Json(OrderItemView {
        item,
        delivery_status: ItemDeliveryStatus::project(offer.as_ref()),
    }))
}

/// Seller marks the item ready for pickup at their current coordinates.
/// Returns the redacted offer; the pickup code travels only on the
/// notification channel.
async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkReadyRequest>,
) -> Result<Json<DeliveryOffer>, AppError> {
    geo::validate(payload.lat, payload.lng)?;

    let outcome = create_offer(&state, id, payload.lat, payload.lng, Utc::now())?;
    Ok(Json(outcome.offer().clone()))
}
