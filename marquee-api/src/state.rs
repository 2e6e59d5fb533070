use std::collections::HashSet;
use std::sync::Arc;

use marquee_infra::audit_repo::AuditStore;
use marquee_infra::booking_repo::BookingStore;
use marquee_infra::config::Config;
use marquee_infra::database::DbClient;
use marquee_infra::orchestrator::BookingOrchestrator;
use marquee_infra::seatlock::LockEngine;
use marquee_infra::user_repo::PostgresUserRepo;

use crate::auth::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DbClient,
    pub redis: redis::Client,
    pub jwt: Arc<JwtService>,
    pub locks: Arc<dyn LockEngine>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub users: Arc<PostgresUserRepo>,
    pub bookings: Arc<dyn BookingStore>,
    pub audits: Arc<dyn AuditStore>,
    pub http: reqwest::Client,
    // lowercased allowlist deciding the ADMIN role on OAuth callback
    pub admin_emails: Arc<HashSet<String>>,
}
