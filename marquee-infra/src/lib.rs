pub mod audit_consumer;
pub mod audit_repo;
pub mod booking_repo;
pub mod bus;
pub mod cache;
pub mod config;
pub mod database;
pub mod orchestrator;
pub mod seatlock;
pub mod sweeper;
pub mod user_repo;

pub use audit_repo::{AdminAuditFilter, AuditStore, PostgresAuditStore};
pub use booking_repo::{AdminBookingFilter, BookingStore, PostgresBookingStore, StoreError};
pub use bus::{EventBus, RedisEventBus};
pub use config::Config;
pub use database::DbClient;
pub use orchestrator::{BookingError, BookingOrchestrator};
pub use seatlock::{
    ConfirmOutcome, ConfirmReason, LockEngine, LockInfo, LockOutcome, SeatLockError,
    SeatLockService,
};
pub use user_repo::PostgresUserRepo;
