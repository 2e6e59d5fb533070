use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use marquee_domain::seat::normalize_seat_ids;
use marquee_infra::orchestrator::BookingError;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

const CONFIRM_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    seat_ids: Vec<String>,
    #[serde(default)]
    request_id: String,
}

// POST /api/showtimes/:showtime_id/bookings/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid_body"))?;
    let seat_ids =
        normalize_seat_ids(&req.seat_ids).map_err(|_| ApiError::BadRequest("invalid_seat_ids"))?;

    let request_id = req.request_id.trim();
    if request_id.is_empty() {
        return Err(ApiError::BadRequest("missing_request_id"));
    }

    let owner =
        Uuid::parse_str(&user.user_id).map_err(|_| ApiError::Unauthorized("invalid_user"))?;

    let result = timeout(
        CONFIRM_DEADLINE,
        state
            .orchestrator
            .confirm_booking(&showtime_id, seat_ids, owner, request_id),
    )
    .await
    .map_err(|_| ApiError::Internal("confirm_failed"))?;

    match result {
        Ok(booking) => Ok(Json(json!({"ok": true, "booking": booking}))),
        Err(BookingError::Conflict { reason, seat_id }) => Err(ApiError::SeatsUnavailable {
            reason: Some(reason.as_str()),
            conflicted: vec![seat_id],
        }),
        Err(BookingError::Lock(_)) => Err(ApiError::Internal("confirm_failed")),
        Err(BookingError::CreateFailed(_)) => Err(ApiError::Internal("db_create_failed")),
        Err(BookingError::FinalizeFailed(_)) => Err(ApiError::Internal("db_update_failed")),
    }
}
