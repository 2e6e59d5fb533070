use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use marquee_domain::booking::BookingStatus;
use marquee_infra::audit_repo::AdminAuditFilter;
use marquee_infra::booking_repo::AdminBookingFilter;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const QUERY_DEADLINE: Duration = Duration::from_secs(5);

fn parse_rfc3339(raw: &str, code: &'static str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(code))
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingsQuery {
    showtime_id: Option<String>,
    status: Option<String>,
    user_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    skip: i64,
}

// GET /api/admin/bookings?showtime_id=&status=&user_id=&from=&to=&limit=&skip=
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(q): Query<BookingsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut filter = AdminBookingFilter {
        showtime_id: q.showtime_id.filter(|s| !s.is_empty()),
        limit: q.limit,
        skip: q.skip,
        ..Default::default()
    };

    if let Some(status) = q.status.filter(|s| !s.is_empty()) {
        filter.status =
            Some(BookingStatus::parse(&status).ok_or(ApiError::BadRequest("invalid_status"))?);
    }
    if let Some(user_id) = q.user_id.filter(|s| !s.is_empty()) {
        filter.user_id =
            Some(Uuid::parse_str(&user_id).map_err(|_| ApiError::BadRequest("invalid_user_id"))?);
    }
    if let Some(from) = q.from.filter(|s| !s.is_empty()) {
        filter.from = Some(parse_rfc3339(&from, "invalid_from")?);
    }
    if let Some(to) = q.to.filter(|s| !s.is_empty()) {
        filter.to = Some(parse_rfc3339(&to, "invalid_to")?);
    }

    let (items, total) = timeout(QUERY_DEADLINE, state.bookings.find_admin(&filter))
        .await
        .map_err(|_| ApiError::Internal("db_failed"))?
        .map_err(|_| ApiError::Internal("db_failed"))?;

    Ok(Json(json!({"ok": true, "total": total, "items": items})))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    showtime_id: Option<String>,
    user_id: Option<String>,
    booking_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    skip: i64,
}

// GET /api/admin/audit?type=&showtime_id=&user_id=&booking_id=&from=&to=&limit=&skip=
pub async fn list_audit(
    State(state): State<AppState>,
    Query(q): Query<AuditQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut filter = AdminAuditFilter {
        kind: q.kind.filter(|s| !s.is_empty()),
        showtime_id: q.showtime_id.filter(|s| !s.is_empty()),
        user_id: q.user_id.filter(|s| !s.is_empty()),
        booking_id: q.booking_id.filter(|s| !s.is_empty()),
        limit: q.limit,
        skip: q.skip,
        ..Default::default()
    };

    if let Some(from) = q.from.filter(|s| !s.is_empty()) {
        filter.from = Some(parse_rfc3339(&from, "invalid_from")?);
    }
    if let Some(to) = q.to.filter(|s| !s.is_empty()) {
        filter.to = Some(parse_rfc3339(&to, "invalid_to")?);
    }

    let (items, total) = timeout(QUERY_DEADLINE, state.audits.find_admin(&filter))
        .await
        .map_err(|_| ApiError::Internal("db_failed"))?
        .map_err(|_| ApiError::Internal("db_failed"))?;

    Ok(Json(json!({"ok": true, "total": total, "items": items})))
}

// GET /api/admin/ping
pub async fn ping() -> Json<Value> {
    Json(json!({"ok": true, "admin": true}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_parsing() {
        let t = parse_rfc3339("2026-02-18T00:00:00Z", "invalid_from").unwrap();
        assert_eq!(t.timestamp(), 1771372800);
        assert!(parse_rfc3339("yesterday", "invalid_from").is_err());
    }
}
