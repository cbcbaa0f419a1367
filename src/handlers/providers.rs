use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{AvailabilityProfile, Booking, DaySlots, NextSlot, Service};
use crate::services::directory::validate_id;
use crate::state::AppState;

const MAX_DAYS_AHEAD: u32 = 90;

fn check_days(days: Option<u32>) -> Result<Option<u32>, AppError> {
    match days {
        Some(d) if d == 0 || d > MAX_DAYS_AHEAD => Err(AppError::InvalidInput(format!(
            "days must be between 1 and {MAX_DAYS_AHEAD}"
        ))),
        other => Ok(other),
    }
}

// GET /api/providers/:id/availability?days=N
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub days: Option<u32>,
}

pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<DaySlots>>, AppError> {
    let days = check_days(query.days)?;
    let slots = state.scheduler.available_slots(&id, days, None, None).await?;
    Ok(Json(slots))
}

// POST /api/providers/:id/availability
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub days_ahead: Option<u32>,
    pub profile: Option<AvailabilityProfile>,
}

pub async fn availability_with_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> Result<Json<Vec<DaySlots>>, AppError> {
    let days = check_days(body.days_ahead)?;
    let slots = state
        .scheduler
        .available_slots(&id, days, body.profile, None)
        .await?;
    Ok(Json(slots))
}

// GET /api/providers/:id/next-slot
pub async fn next_slot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Option<NextSlot>>, AppError> {
    let slot = state.scheduler.next_available_slot(&id, None, None).await?;
    Ok(Json(slot))
}

// GET /api/providers/:id/services
pub async fn services(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Service>>, AppError> {
    validate_id(&id)?;
    Ok(Json(state.directory.provider_services(&id).await))
}

// GET /api/providers/:id/bookings
pub async fn bookings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    validate_id(&id)?;
    Ok(Json(state.bookings.provider_bookings(&id).await))
}
