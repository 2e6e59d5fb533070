mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{InMemoryBookingStore, InMemoryLockEngine, RecordingEventBus};
use marquee_domain::booking::BookingStatus;
use marquee_infra::orchestrator::{BookingError, BookingOrchestrator};
use marquee_infra::seatlock::{ConfirmReason, LockEngine};
use uuid::Uuid;

fn seats(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

struct Fixture {
    engine: Arc<InMemoryLockEngine>,
    store: Arc<InMemoryBookingStore>,
    bus: Arc<RecordingEventBus>,
    orchestrator: BookingOrchestrator,
}

fn fixture() -> Fixture {
    let engine = Arc::new(InMemoryLockEngine::new(Duration::from_secs(300)));
    let store = Arc::new(InMemoryBookingStore::new());
    let bus = Arc::new(RecordingEventBus::new());
    let orchestrator =
        BookingOrchestrator::new(engine.clone(), store.clone(), bus.clone());
    Fixture {
        engine,
        store,
        bus,
        orchestrator,
    }
}

#[tokio::test]
async fn clean_booking_finalizes_record_and_publishes_success() {
    let fx = fixture();
    let owner = Uuid::new_v4();

    fx.engine
        .lock_seats("show-1", &seats(&["A1", "A2"]), &owner.to_string(), "r1")
        .await
        .unwrap();

    let booking = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["A1", "A2"]), owner, "r1")
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Booked);
    assert_eq!(booking.amount, 200);
    assert_eq!(booking.currency, "THB");
    assert!(booking.payment_ref.as_deref().unwrap().starts_with("mock_"));
    assert!(booking.booked_at.is_some());

    // store holds the finalized record
    assert_eq!(fx.store.status_of(booking.id), Some(BookingStatus::Booked));

    // seats flipped LOCKED -> BOOKED
    assert_eq!(
        fx.engine.list_booked("show-1").await.unwrap(),
        seats(&["A1", "A2"])
    );
    assert!(fx.engine.list_locks("show-1").await.unwrap().is_empty());

    // booking.success published with mocked pricing
    let events = fx.bus.payloads_on("booking-events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "booking.success");
    assert_eq!(events[0]["amount"], 200);
    assert_eq!(events[0]["currency"], "THB");
    assert_eq!(events[0]["booking_id"], booking.id.to_string());
}

#[tokio::test]
async fn conflict_marks_booking_failed_and_publishes_nothing() {
    let fx = fixture();
    let owner = Uuid::new_v4();

    // no lock was ever taken
    let err = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["A1"]), owner, "r1")
        .await
        .unwrap_err();

    match err {
        BookingError::Conflict { reason, seat_id } => {
            assert_eq!(reason, ConfirmReason::MissingLock);
            assert_eq!(seat_id, "A1");
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let record = fx.store.single_booking();
    assert_eq!(record.status, BookingStatus::Failed);
    assert!(fx.bus.payloads_on("booking-events").is_empty());
}

#[tokio::test]
async fn wrong_request_id_is_a_not_owner_conflict() {
    let fx = fixture();
    let owner = Uuid::new_v4();

    fx.engine
        .lock_seats("show-1", &seats(&["A1"]), &owner.to_string(), "r1")
        .await
        .unwrap();

    let err = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["A1"]), owner, "r2")
        .await
        .unwrap_err();

    match err {
        BookingError::Conflict { reason, .. } => assert_eq!(reason, ConfirmReason::NotOwner),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn mutual_exclusion_only_one_booked_record_per_seat() {
    let fx = fixture();
    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();

    fx.engine
        .lock_seats("show-1", &seats(&["D4"]), &u1.to_string(), "r1")
        .await
        .unwrap();

    let first = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["D4"]), u1, "r1")
        .await
        .unwrap();
    assert_eq!(first.status, BookingStatus::Booked);

    // the second attempt fails before any record can finalize
    let err = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["D4"]), u2, "r2")
        .await
        .unwrap_err();
    match err {
        BookingError::Conflict { reason, seat_id } => {
            assert_eq!(reason, ConfirmReason::AlreadyBooked);
            assert_eq!(seat_id, "D4");
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let bookings = fx.store.bookings.lock().unwrap();
    let booked: Vec<_> = bookings
        .values()
        .filter(|b| b.status == BookingStatus::Booked)
        .collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].id, first.id);
}

#[tokio::test]
async fn persistence_failure_after_confirm_is_surfaced_as_anomaly() {
    let fx = fixture();
    let owner = Uuid::new_v4();

    fx.engine
        .lock_seats("show-1", &seats(&["E1"]), &owner.to_string(), "r1")
        .await
        .unwrap();
    fx.store.fail_mark_booked.store(true, Ordering::SeqCst);

    let err = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["E1"]), owner, "r1")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::FinalizeFailed(_)));

    // booked markers stay in place while the record reads FAILED; the gap is
    // left for external reconciliation
    assert_eq!(fx.engine.list_booked("show-1").await.unwrap(), seats(&["E1"]));
    let record = fx.store.single_booking();
    assert_eq!(record.status, BookingStatus::Failed);
    assert!(fx.bus.payloads_on("booking-events").is_empty());
}

#[tokio::test]
async fn create_failure_leaves_locks_untouched() {
    let fx = fixture();
    let owner = Uuid::new_v4();

    fx.engine
        .lock_seats("show-1", &seats(&["F2"]), &owner.to_string(), "r1")
        .await
        .unwrap();
    fx.store.fail_create.store(true, Ordering::SeqCst);

    let err = fx
        .orchestrator
        .confirm_booking("show-1", seats(&["F2"]), owner, "r1")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::CreateFailed(_)));

    // the hold is still there; the client can retry
    let locks = fx.engine.list_locks("show-1").await.unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].seat_id, "F2");
    assert!(fx.engine.list_booked("show-1").await.unwrap().is_empty());
}
