use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::{Booking, BookingDraft, BookingStatus, CancelledBy, PaymentStatus};
use crate::services::directory::validate_id;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

// GET /api/customers/:id/bookings
pub async fn customer_bookings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    validate_id(&id)?;
    Ok(Json(state.bookings.customer_bookings(&id).await))
}

// GET /api/bookings?status=&limit=
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = match query.status.as_deref() {
        Some(raw) => {
            let status = BookingStatus::parse(raw)
                .ok_or_else(|| AppError::InvalidInput(format!("unknown booking status: {raw}")))?;
            state.bookings.bookings_by_status(status, query.limit).await
        }
        None => {
            state
                .bookings
                .recent_bookings(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
                .await
        }
    };
    Ok(Json(bookings))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let id = state.bookings.create_booking(draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_booking(&id).await?))
}

// POST /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
    pub notes: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Value>, AppError> {
    let status = state
        .bookings
        .update_status(&id, body.status, body.notes)
        .await?;
    Ok(Json(json!({ "ok": true, "status": status })))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
    pub cancelled_by: CancelledBy,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .bookings
        .cancel_booking(&id, body.reason, body.cancelled_by)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

// POST /api/bookings/:id/payment
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
}

pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let status = state
        .bookings
        .update_payment(&id, body.payment_status, body.payment_id)
        .await?;
    Ok(Json(json!({ "ok": true, "paymentStatus": status })))
}

// POST /api/bookings/:id/review
#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub review: String,
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Value>, AppError> {
    state.bookings.add_review(&id, body.rating, body.review).await?;
    Ok(Json(json!({ "ok": true })))
}
