use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::coordinator::CacheStats;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/cache
pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CacheStats>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.directory.cache_stats()))
}

// POST /api/admin/cache/clear
#[derive(Deserialize, Default)]
pub struct ClearCacheRequest {
    pub key: Option<String>,
}

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<ClearCacheRequest>>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let Json(body) = body.unwrap_or_default();
    state.directory.clear_cache(body.key.as_deref());
    tracing::info!(key = ?body.key, "coordinator cache cleared");
    Ok(Json(json!({ "ok": true })))
}

// POST /api/admin/providers/:id/approve
pub async fn approve_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    state.directory.approve_provider(&id).await?;
    Ok(Json(json!({ "ok": true })))
}

// DELETE /api/admin/bookings/:id
pub async fn purge_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    state.bookings.purge_booking(&id).await?;
    Ok(Json(json!({ "ok": true })))
}
