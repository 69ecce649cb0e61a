use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::rider::Rider;
use crate::models::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(create_rider).get(list_riders))
        .route("/riders/:id/status", patch(update_rider_status))
        .route("/riders/:id/location", patch(update_rider_location))
}

#[derive(Deserialize)]
pub struct CreateRiderRequest {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Serialize)]
pub struct RiderLocationView {
    #[serde(flatten)]
    pub rider: Rider,
    /// Precision-5 cell the rider's zone subscription should point at.
    pub zone_cell: String,
}

async fn create_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    // One rider account per user.
    let entry = state.riders_by_user.entry(payload.user_id);
    let entry = match entry {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            return Err(AppError::IneligibleState(format!(
                "user {} already has a rider account",
                payload.user_id
            )));
        }
        dashmap::mapref::entry::Entry::Vacant(vacant) => vacant,
    };

    let rider = Rider {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        name: payload.name,
        is_active: false,
        location: None,
        suspended_until: None,
        updated_at: Utc::now(),
    };

    state.riders.insert(rider.id, rider.clone());
    entry.insert(rider.id);
    Ok(Json(rider))
}

async fn list_riders(State(state): State<Arc<AppState>>) -> Json<Vec<Rider>> {
    let riders = state
        .riders
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(riders)
}

async fn update_rider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;

    rider.is_active = payload.is_active;
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}

/// Client-reported position. Ephemeral: never coupled to offer state. The
/// response names the precision-5 cell so HTTP-only clients can drive
/// their own zone resubscription.
async fn update_rider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<RiderLocationView>, AppError> {
    geo::validate(payload.location.lat, payload.location.lng)?;

    let rider = {
        let mut rider = state
            .riders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("rider {id} not found")))?;

        rider.location = Some(payload.location);
        rider.updated_at = Utc::now();
        rider.clone()
    };

    let zone_cell = geo::encode(
        payload.location.lat,
        payload.location.lng,
        geo::RIDER_ZONE_PRECISION,
    );
    Ok(Json(RiderLocationView { rider, zone_cell }))
}
