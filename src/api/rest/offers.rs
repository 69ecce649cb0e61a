use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::accept::accept_offer;
use crate::engine::cancel::cancel_offer;
use crate::engine::verify::{verify_delivery, verify_pickup};
use crate::error::AppError;
use crate::models::events::CancelReason;
use crate::models::offer::DeliveryOffer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers/accept", post(accept))
        .route("/offers/:id", get(get_offer))
        .route("/offers/:id/verify-pickup", post(verify_pickup_code))
        .route("/offers/:id/verify-delivery", post(verify_delivery_code))
        .route("/offers/:id/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub rider_id: Uuid,
    pub order_item_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

/// A rider claims an open offer. Exactly one concurrent caller wins; the
/// rest get a specific race-loss error rather than a generic failure.
async fn accept(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<DeliveryOffer>, AppError> {
    let offer = accept_offer(&state, payload.rider_id, payload.order_item_id, Utc::now())?;
    Ok(Json(offer))
}

async fn get_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOffer>, AppError> {
    let offer = state
        .offers
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("offer {id} not found")))?;

    Ok(Json(offer))
}

async fn verify_pickup_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<DeliveryOffer>, AppError> {
    validate_code(&payload.code)?;
    let offer = verify_pickup(&state, id, &payload.code, Utc::now())?;
    Ok(Json(offer))
}

async fn verify_delivery_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<DeliveryOffer>, AppError> {
    validate_code(&payload.code)?;
    let offer = verify_delivery(&state, id, &payload.code, Utc::now())?;
    Ok(Json(offer))
}

/// Explicit seller/admin cancellation; idempotent.
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOffer>, AppError> {
    let offer = cancel_offer(&state, id, CancelReason::Explicit)?;
    Ok(Json(offer))
}

fn validate_code(code: &str) -> Result<(), AppError> {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed.len() > 16 {
        return Err(AppError::BadRequest(
            "code must be between 1 and 16 characters".to_string(),
        ));
    }
    Ok(())
}
