use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use marquee_api::{app, state::AppState};
use marquee_api::auth::JwtService;
use marquee_infra::audit_repo::{AuditStore, PostgresAuditStore};
use marquee_infra::booking_repo::{BookingStore, PostgresBookingStore};
use marquee_infra::bus::RedisEventBus;
use marquee_infra::orchestrator::BookingOrchestrator;
use marquee_infra::seatlock::{LockEngine, SeatLockService};
use marquee_infra::user_repo::PostgresUserRepo;
use marquee_infra::{audit_consumer, cache, config::Config, database::DbClient, sweeper};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,marquee_infra=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load()?);
    tracing::info!("starting marquee api on port {}", config.port);

    let db = DbClient::connect(&config.database_url).await?;
    let redis = cache::connect_redis(&config.redis_addr).await?;

    let jwt = Arc::new(JwtService::new(&config.jwt_secret));
    let bus = Arc::new(RedisEventBus::new(redis.clone()));

    let locks: Arc<dyn LockEngine> = Arc::new(SeatLockService::new(
        redis.clone(),
        bus.clone(),
        Duration::from_secs(config.seat_lock_ttl_seconds),
    ));

    let bookings: Arc<dyn BookingStore> = Arc::new(PostgresBookingStore::new(db.pool()));
    let audits: Arc<dyn AuditStore> = Arc::new(PostgresAuditStore::new(db.pool()));
    let users = Arc::new(PostgresUserRepo::new(db.pool()));

    let orchestrator = Arc::new(BookingOrchestrator::new(
        locks.clone(),
        bookings.clone(),
        bus.clone(),
    ));

    // background workers; stopped via the shutdown signal before connections close
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(sweeper::run_timeout_sweeper(
        redis.clone(),
        bus.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(audit_consumer::run_audit_consumer(
        redis.clone(),
        audits.clone(),
        shutdown_rx,
    ));

    let admin_emails: HashSet<String> = config.admin_emails().into_iter().collect();

    let state = AppState {
        config: config.clone(),
        db,
        redis,
        jwt,
        locks,
        orchestrator,
        users,
        bookings,
        audits,
        http: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?,
        admin_emails: Arc::new(admin_emails),
    };

    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
