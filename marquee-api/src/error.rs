use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Wire-level error; every variant maps to the `{ok:false, error:<code>}`
/// body shape the frontend dispatches on.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("forbidden")]
    Forbidden,
    #[error("seats unavailable")]
    SeatsUnavailable {
        reason: Option<&'static str>,
        conflicted: Vec<String>,
    },
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(code) => {
                (StatusCode::BAD_REQUEST, Json(json!({"ok": false, "error": code}))).into_response()
            }
            ApiError::Unauthorized(code) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"ok": false, "error": code})),
            )
                .into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({"ok": false, "error": "forbidden"})),
            )
                .into_response(),
            ApiError::SeatsUnavailable { reason, conflicted } => {
                let mut body = json!({
                    "ok": false,
                    "error": "seats_unavailable",
                    "conflicted": conflicted,
                });
                if let Some(reason) = reason {
                    body["reason"] = json!(reason);
                }
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            ApiError::Internal(code) => {
                tracing::error!("internal error: {code}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"ok": false, "error": code})),
                )
                    .into_response()
            }
        }
    }
}
