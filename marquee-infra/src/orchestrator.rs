use std::sync::Arc;

use chrono::Utc;
use marquee_domain::booking::{Booking, BookingStatus};
use marquee_domain::events::BookingEvent;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::booking_repo::{BookingStore, StoreError};
use crate::bus::{publish_booking_event, EventBus};
use crate::seatlock::{ConfirmOutcome, ConfirmReason, LockEngine, SeatLockError};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("seats unavailable ({seat_id}): {}", .reason.as_str())]
    Conflict {
        reason: ConfirmReason,
        seat_id: String,
    },
    #[error(transparent)]
    Lock(#[from] SeatLockError),
    #[error("failed to persist pending booking: {0}")]
    CreateFailed(StoreError),
    #[error("failed to finalize booking: {0}")]
    FinalizeFailed(StoreError),
}

/// Optimistic two-phase commit across the booking store and the lock engine:
/// persist PENDING, atomically flip the seats LOCKED -> BOOKED, then finalize
/// the record. A conflict anywhere marks the record FAILED.
pub struct BookingOrchestrator {
    locks: Arc<dyn LockEngine>,
    bookings: Arc<dyn BookingStore>,
    bus: Arc<dyn EventBus>,
}

impl BookingOrchestrator {
    pub fn new(
        locks: Arc<dyn LockEngine>,
        bookings: Arc<dyn BookingStore>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            locks,
            bookings,
            bus,
        }
    }

    pub async fn confirm_booking(
        &self,
        showtime_id: &str,
        seat_ids: Vec<String>,
        owner: Uuid,
        request_id: &str,
    ) -> Result<Booking, BookingError> {
        let mut booking = Booking::pending(showtime_id, owner, seat_ids, request_id);

        self.bookings
            .create_pending(&booking)
            .await
            .map_err(BookingError::CreateFailed)?;

        let owner_str = owner.to_string();
        let booking_id = booking.id.to_string();

        let outcome = match self
            .locks
            .confirm_booked(
                showtime_id,
                &booking.seat_ids,
                &owner_str,
                request_id,
                &booking_id,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.mark_failed_best_effort(booking.id).await;
                return Err(e.into());
            }
        };

        if let ConfirmOutcome::Rejected { seat_id, reason } = outcome {
            self.mark_failed_best_effort(booking.id).await;
            return Err(BookingError::Conflict { reason, seat_id });
        }

        // mock payment success
        let payment_ref = format!("mock_{}", Uuid::new_v4());
        let booked_at = Utc::now();

        if let Err(e) = self
            .bookings
            .mark_booked(booking.id, &payment_ref, booked_at)
            .await
        {
            // The booked markers are already committed in the KVS, so this
            // booking needs external reconciliation.
            error!(
                booking_id = %booking.id,
                "failed to persist BOOKED after seats were confirmed: {e}"
            );
            self.mark_failed_best_effort(booking.id).await;
            return Err(BookingError::FinalizeFailed(e));
        }

        booking.status = BookingStatus::Booked;
        booking.payment_ref = Some(payment_ref);
        booking.booked_at = Some(booked_at);
        booking.updated_at = booked_at;

        publish_booking_event(
            self.bus.as_ref(),
            &BookingEvent::Success {
                booking_id,
                showtime_id: showtime_id.to_string(),
                user_id: owner_str,
                seat_ids: booking.seat_ids.clone(),
                amount: booking.amount,
                currency: booking.currency.clone(),
                at: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(booking)
    }

    async fn mark_failed_best_effort(&self, booking_id: Uuid) {
        if let Err(e) = self.bookings.mark_failed(booking_id).await {
            warn!(booking_id = %booking_id, "failed to mark booking FAILED: {e}");
        }
    }
}
