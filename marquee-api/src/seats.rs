use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Extension, Json,
};
use marquee_domain::seat::normalize_seat_ids;
use marquee_infra::seatlock::LockOutcome;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

const LOCK_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct SeatIdsRequest {
    #[serde(default)]
    seat_ids: Vec<String>,
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// POST /api/showtimes/:showtime_id/seats/lock
pub async fn lock(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    body: Result<Json<SeatIdsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid_body"))?;
    let seat_ids =
        normalize_seat_ids(&req.seat_ids).map_err(|_| ApiError::BadRequest("invalid_seat_ids"))?;

    // adopted verbatim when the client supplies one
    let request_id = request_id_from_headers(&headers);

    let outcome = timeout(
        LOCK_DEADLINE,
        state
            .locks
            .lock_seats(&showtime_id, &seat_ids, &user.user_id, &request_id),
    )
    .await
    .map_err(|_| ApiError::Internal("lock_failed"))?
    .map_err(|_| ApiError::Internal("lock_failed"))?;

    match outcome {
        LockOutcome::Acquired => Ok(Json(json!({
            "ok": true,
            "locked": seat_ids,
            "ttl_seconds": state.config.seat_lock_ttl_seconds,
            "request_id": request_id,
        }))),
        LockOutcome::Conflict { seat_id } => Err(ApiError::SeatsUnavailable {
            reason: None,
            conflicted: vec![seat_id],
        }),
    }
}

// DELETE /api/showtimes/:showtime_id/seats/lock
pub async fn release(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<SeatIdsRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid_body"))?;
    let seat_ids =
        normalize_seat_ids(&req.seat_ids).map_err(|_| ApiError::BadRequest("invalid_seat_ids"))?;

    timeout(
        LOCK_DEADLINE,
        state
            .locks
            .release_seats(&showtime_id, &seat_ids, &user.user_id),
    )
    .await
    .map_err(|_| ApiError::Internal("release_failed"))?
    .map_err(|_| ApiError::Internal("release_failed"))?;

    Ok(Json(json!({"ok": true, "released": seat_ids})))
}

// GET /api/showtimes/:showtime_id/seats/locks
pub async fn list_locks(
    State(state): State<AppState>,
    Path(showtime_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let locks = timeout(LOCK_DEADLINE, state.locks.list_locks(&showtime_id))
        .await
        .map_err(|_| ApiError::Internal("list_failed"))?
        .map_err(|_| ApiError::Internal("list_failed"))?;

    Ok(Json(json!({
        "ok": true,
        "showtime_id": showtime_id,
        "locks": locks,
    })))
}
