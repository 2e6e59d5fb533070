use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::Redirect,
    Extension, Json,
};
use marquee_domain::user::UserRole;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const EXCHANGE_DEADLINE: Duration = Duration::from_secs(10);
const LOOKUP_DEADLINE: Duration = Duration::from_secs(3);

// GET /api/auth/google/login
pub async fn login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let url = reqwest::Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", state.config.google_client_id.as_str()),
            ("redirect_uri", state.config.google_redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", "dev-state"),
            ("access_type", "online"),
        ],
    )
    .map_err(|_| ApiError::Internal("oauth_url_failed"))?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

// GET /api/auth/google/callback?code=...
pub async fn callback(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Redirect, ApiError> {
    let code = q
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or(ApiError::BadRequest("missing_code"))?;

    let info = timeout(EXCHANGE_DEADLINE, fetch_user_info(&state, &code))
        .await
        .map_err(|_| ApiError::BadRequest("exchange_failed"))??;

    let user = state
        .users
        .upsert_google_user(&info.id, &info.email, &info.name, &info.picture)
        .await
        .map_err(|_| ApiError::Internal("db_failed"))?;

    // role re-derived from the allowlist on every callback
    let email_key = info.email.trim().to_lowercase();
    let desired_role = if state.admin_emails.contains(&email_key) {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let user = if user.role != desired_role {
        state
            .users
            .set_role(user.id, desired_role)
            .await
            .map_err(|_| ApiError::Internal("set_role_failed"))?
    } else {
        user
    };

    let token = state
        .jwt
        .sign(&user.id.to_string(), user.role)
        .map_err(|_| ApiError::Internal("jwt_failed"))?;

    Ok(Redirect::to(&format!(
        "{}/auth/callback?token={}",
        state.config.frontend_url, token
    )))
}

async fn fetch_user_info(state: &AppState, code: &str) -> Result<GoogleUserInfo, ApiError> {
    let params = [
        ("code", code),
        ("client_id", state.config.google_client_id.as_str()),
        ("client_secret", state.config.google_client_secret.as_str()),
        ("redirect_uri", state.config.google_redirect_url.as_str()),
        ("grant_type", "authorization_code"),
    ];

    let response = state
        .http
        .post(TOKEN_URL)
        .form(&params)
        .send()
        .await
        .map_err(|_| ApiError::BadRequest("exchange_failed"))?;
    if !response.status().is_success() {
        return Err(ApiError::BadRequest("exchange_failed"));
    }
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|_| ApiError::BadRequest("decode_failed"))?;

    let response = state
        .http
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|_| ApiError::BadRequest("userinfo_failed"))?;
    if !response.status().is_success() {
        return Err(ApiError::BadRequest("userinfo_failed"));
    }

    response
        .json()
        .await
        .map_err(|_| ApiError::BadRequest("decode_failed"))
}

// GET /api/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let user_id =
        Uuid::parse_str(&auth.user_id).map_err(|_| ApiError::Unauthorized("invalid_user"))?;

    let user = timeout(LOOKUP_DEADLINE, state.users.find_by_id(user_id))
        .await
        .map_err(|_| ApiError::Internal("db_failed"))?
        .map_err(|_| ApiError::Internal("db_failed"))?;

    Ok(Json(json!({
        "ok": true,
        "role": user.role.as_str(),
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "picture": user.picture,
            "role": user.role.as_str(),
        },
    })))
}
