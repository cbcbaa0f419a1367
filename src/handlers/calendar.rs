use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);
    let booking = state.bookings.get_booking(booking_id).await?;

    let business_name = match state.directory.get_provider(&booking.provider_id, None).await {
        Ok(provider) if !provider.business_name.is_empty() => provider.business_name,
        Ok(_) => "your provider".to_string(),
        Err(e) => {
            tracing::warn!(booking_id, error = %e, "provider lookup failed for .ics");
            "your provider".to_string()
        }
    };

    let ics = generate_ics(&booking, &business_name);
    let filename = format!("booking-{booking_id}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
