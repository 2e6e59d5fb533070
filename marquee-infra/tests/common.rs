#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_domain::booking::{Booking, BookingStatus};
use marquee_infra::booking_repo::{AdminBookingFilter, BookingStore, StoreError};
use marquee_infra::bus::{BusResult, EventBus};
use marquee_infra::seatlock::{
    ConfirmOutcome, ConfirmReason, LockEngine, LockInfo, LockOutcome, SeatLockError,
};
use uuid::Uuid;

// =====================
// In-memory lock engine
// =====================

struct LockEntry {
    owner: String,
    request_id: String,
    expires_at: Instant,
}

#[derive(Default)]
struct LockState {
    locks: HashMap<(String, String), LockEntry>,
    booked: HashMap<(String, String), String>,
}

/// Honors the production lock contract: all-or-nothing acquire with booked
/// and foreign-lock conflicts, prefix-match release, exact-match confirm.
pub struct InMemoryLockEngine {
    state: Mutex<LockState>,
    ttl: Duration,
}

impl InMemoryLockEngine {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            ttl,
        }
    }

    /// Simulates TTL lapse for a held lock.
    pub fn force_expire(&self, showtime_id: &str, seat_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state
            .locks
            .get_mut(&(showtime_id.to_string(), seat_id.to_string()))
        {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }

    fn live<'a>(entry: Option<&'a LockEntry>) -> Option<&'a LockEntry> {
        entry.filter(|e| e.expires_at > Instant::now())
    }
}

#[async_trait]
impl LockEngine for InMemoryLockEngine {
    async fn lock_seats(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
    ) -> Result<LockOutcome, SeatLockError> {
        if seat_ids.is_empty() {
            return Err(SeatLockError::InvalidInput("seat_ids required"));
        }
        if owner.is_empty() || request_id.is_empty() {
            return Err(SeatLockError::InvalidInput("owner/request_id required"));
        }

        let mut state = self.state.lock().unwrap();

        for sid in seat_ids {
            let key = (showtime_id.to_string(), sid.clone());
            if state.booked.contains_key(&key) {
                return Ok(LockOutcome::Conflict {
                    seat_id: sid.clone(),
                });
            }
            if let Some(entry) = Self::live(state.locks.get(&key)) {
                if entry.owner != owner {
                    return Ok(LockOutcome::Conflict {
                        seat_id: sid.clone(),
                    });
                }
            }
        }

        let expires_at = Instant::now() + self.ttl;
        for sid in seat_ids {
            state.locks.insert(
                (showtime_id.to_string(), sid.clone()),
                LockEntry {
                    owner: owner.to_string(),
                    request_id: request_id.to_string(),
                    expires_at,
                },
            );
        }

        Ok(LockOutcome::Acquired)
    }

    async fn release_seats(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
    ) -> Result<(), SeatLockError> {
        if seat_ids.is_empty() {
            return Ok(());
        }
        if owner.is_empty() {
            return Err(SeatLockError::InvalidInput("owner required"));
        }

        let mut state = self.state.lock().unwrap();
        for sid in seat_ids {
            let key = (showtime_id.to_string(), sid.clone());
            let owned = matches!(Self::live(state.locks.get(&key)), Some(e) if e.owner == owner);
            if owned {
                state.locks.remove(&key);
            }
        }
        Ok(())
    }

    async fn confirm_booked(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
        booking_id: &str,
    ) -> Result<ConfirmOutcome, SeatLockError> {
        if seat_ids.is_empty() {
            return Err(SeatLockError::InvalidInput("seat_ids required"));
        }
        if owner.is_empty() || request_id.is_empty() || booking_id.is_empty() {
            return Err(SeatLockError::InvalidInput(
                "owner/request_id/booking_id required",
            ));
        }

        let mut state = self.state.lock().unwrap();

        for sid in seat_ids {
            let key = (showtime_id.to_string(), sid.clone());
            if state.booked.contains_key(&key) {
                return Ok(ConfirmOutcome::Rejected {
                    seat_id: sid.clone(),
                    reason: ConfirmReason::AlreadyBooked,
                });
            }
        }

        for sid in seat_ids {
            let key = (showtime_id.to_string(), sid.clone());
            match Self::live(state.locks.get(&key)) {
                None => {
                    return Ok(ConfirmOutcome::Rejected {
                        seat_id: sid.clone(),
                        reason: ConfirmReason::MissingLock,
                    });
                }
                Some(entry) => {
                    if entry.owner != owner || entry.request_id != request_id {
                        return Ok(ConfirmOutcome::Rejected {
                            seat_id: sid.clone(),
                            reason: ConfirmReason::NotOwner,
                        });
                    }
                }
            }
        }

        for sid in seat_ids {
            let key = (showtime_id.to_string(), sid.clone());
            state.locks.remove(&key);
            state.booked.insert(key, booking_id.to_string());
        }

        Ok(ConfirmOutcome::Confirmed)
    }

    async fn list_locks(&self, showtime_id: &str) -> Result<Vec<LockInfo>, SeatLockError> {
        let state = self.state.lock().unwrap();
        let now = Instant::now();
        let mut out: Vec<LockInfo> = state
            .locks
            .iter()
            .filter(|((st, _), entry)| st == showtime_id && entry.expires_at > now)
            .map(|((_, seat), entry)| LockInfo {
                seat_id: seat.clone(),
                owner: entry.owner.clone(),
                request_id: entry.request_id.clone(),
                ttl_seconds: (entry.expires_at - now).as_secs() as i64,
            })
            .collect();
        out.sort_by(|a, b| a.seat_id.cmp(&b.seat_id));
        Ok(out)
    }

    async fn list_booked(&self, showtime_id: &str) -> Result<Vec<String>, SeatLockError> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<String> = state
            .booked
            .keys()
            .filter(|(st, _)| st == showtime_id)
            .map(|(_, seat)| seat.clone())
            .collect();
        out.sort();
        Ok(out)
    }
}

// =====================
// In-memory booking store
// =====================

#[derive(Default)]
pub struct InMemoryBookingStore {
    pub bookings: Mutex<HashMap<Uuid, Booking>>,
    pub fail_create: AtomicBool,
    pub fail_mark_booked: AtomicBool,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, id: Uuid) -> Option<BookingStatus> {
        self.bookings.lock().unwrap().get(&id).map(|b| b.status)
    }

    pub fn single_booking(&self) -> Booking {
        let bookings = self.bookings.lock().unwrap();
        assert_eq!(bookings.len(), 1, "expected exactly one booking");
        bookings.values().next().unwrap().clone()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create_pending(&self, booking: &Booking) -> Result<(), StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("create unavailable".into()));
        }
        self.bookings
            .lock()
            .unwrap()
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn mark_booked(
        &self,
        id: Uuid,
        payment_ref: &str,
        booked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_mark_booked.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update unavailable".into()));
        }
        let mut bookings = self.bookings.lock().unwrap();
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("booking {id} not found")))?;
        if booking.status != BookingStatus::Pending {
            return Err(StoreError::Backend(format!("booking {id} is not PENDING")));
        }
        booking.status = BookingStatus::Booked;
        booking.payment_ref = Some(payment_ref.to_string());
        booking.booked_at = Some(booked_at);
        booking.updated_at = booked_at;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        if let Some(booking) = bookings.get_mut(&id) {
            if booking.status == BookingStatus::Pending {
                booking.status = BookingStatus::Failed;
                booking.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn find_admin(
        &self,
        filter: &AdminBookingFilter,
    ) -> Result<(Vec<Booking>, i64), StoreError> {
        let bookings = self.bookings.lock().unwrap();
        let items: Vec<Booking> = bookings
            .values()
            .filter(|b| {
                filter
                    .showtime_id
                    .as_ref()
                    .map_or(true, |st| &b.showtime_id == st)
                    && filter.status.map_or(true, |s| b.status == s)
                    && filter.user_id.map_or(true, |u| b.user_id == u)
            })
            .cloned()
            .collect();
        let total = items.len() as i64;
        Ok((items, total))
    }
}

// =====================
// Recording event bus
// =====================

#[derive(Default)]
pub struct RecordingEventBus {
    pub published: Mutex<Vec<(String, String)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn payloads_on(&self, channel: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, payload)| serde_json::from_str(&payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, channel: &str, payload: &str) -> BusResult {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}
