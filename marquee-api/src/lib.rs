use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::time::timeout;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod google;
pub mod middleware;
pub mod seats;
pub mod state;
pub mod ws;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let showtimes = Router::new()
        .route("/seats/lock", post(seats::lock).delete(seats::release))
        .route("/seats/locks", get(seats::list_locks))
        .route("/bookings/confirm", post(bookings::confirm));

    let protected = Router::new()
        .route("/api/me", get(google::me))
        .nest("/api/showtimes/:showtime_id", showtimes)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_required,
        ));

    // auth runs first, then the role gate
    let admin = Router::new()
        .route("/bookings", get(admin::list_bookings))
        .route("/audit", get(admin::list_audit))
        .route("/ping", get(admin::ping))
        .layer(from_fn(middleware::require_admin))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_required,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/google/login", get(google::login))
        .route("/api/auth/google/callback", get(google::callback))
        .route("/ws/showtimes/:showtime_id/seats", get(ws::seats))
        .merge(protected)
        .nest("/api/admin", admin)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 3600))
}

const HEALTH_DEADLINE: Duration = Duration::from_secs(2);

// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = timeout(HEALTH_DEADLINE, state.db.ping())
        .await
        .unwrap_or(false);
    let redis_ok = timeout(HEALTH_DEADLINE, marquee_infra::cache::ping_redis(&state.redis))
        .await
        .unwrap_or(false);

    Json(json!({
        "ok": true,
        "env": state.config.app_env,
        "port": state.config.port,
        "db_ok": db_ok,
        "redis_ok": redis_ok,
    }))
}
