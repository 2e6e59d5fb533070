use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use marquee_domain::user::UserRole;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller identity, injected into request extensions by
/// `auth_required`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: String,
}

pub async fn auth_required(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized("missing_authorization_header"))?;

    // Expect: "Bearer <token>"
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ApiError::Unauthorized("invalid_authorization_format"));
    }

    let claims = state
        .jwt
        .verify(token)
        .map_err(|_| ApiError::Unauthorized("invalid_token"))?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(ApiError::Unauthorized("no_role"))?;

    if UserRole::parse(&user.role) != Some(UserRole::Admin) {
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(req).await)
}
