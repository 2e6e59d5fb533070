use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use marquee_domain::events::SeatEvent;
use redis::Script;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::bus::{publish_seat_event, EventBus};

// =====================
// Keyspace
// =====================

pub(crate) fn lock_key(showtime_id: &str, seat_id: &str) -> String {
    format!("seatlock:{showtime_id}:{seat_id}")
}

pub(crate) fn booked_key(showtime_id: &str, seat_id: &str) -> String {
    format!("seatbooked:{showtime_id}:{seat_id}")
}

pub(crate) fn exp_zkey(showtime_id: &str) -> String {
    format!("seatlockexp:{showtime_id}")
}

// member format: "A1|<owner>|<rid>"
pub(crate) fn exp_member(seat_id: &str, owner: &str, request_id: &str) -> String {
    format!("{seat_id}|{owner}|{request_id}")
}

pub(crate) fn parse_exp_member(member: &str) -> Option<(&str, &str, &str)> {
    let mut parts = member.split('|');
    let seat = parts.next()?;
    let owner = parts.next()?;
    let rid = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((seat, owner, rid))
}

// seatlock:<showtime>:<seat> -> seat is the last colon segment
fn seat_from_key(key: &str) -> String {
    key.rsplit(':').next().unwrap_or(key).to_string()
}

// =====================
// Outcomes & errors
// =====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    Conflict { seat_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReason {
    AlreadyBooked,
    MissingLock,
    NotOwner,
}

impl ConfirmReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmReason::AlreadyBooked => "already_booked",
            ConfirmReason::MissingLock => "missing_lock",
            ConfirmReason::NotOwner => "not_owner",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "already_booked" => Some(ConfirmReason::AlreadyBooked),
            "missing_lock" => Some(ConfirmReason::MissingLock),
            "not_owner" => Some(ConfirmReason::NotOwner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Rejected {
        seat_id: String,
        reason: ConfirmReason,
    },
}

#[derive(Debug, Error)]
pub enum SeatLockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unexpected script result: {0}")]
    UnexpectedScriptResult(String),
}

/// Live lock as reported by `list_locks`.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub seat_id: String,
    pub owner: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    pub ttl_seconds: i64,
}

// =====================
// Engine seam
// =====================

/// The seat-lock contract. Production impl runs Lua scripts against Redis;
/// tests substitute an in-memory engine honoring the same semantics.
#[async_trait]
pub trait LockEngine: Send + Sync {
    /// All-or-nothing acquisition. Booked seats and seats locked by another
    /// owner conflict; re-entrant for the same owner under any request id.
    /// On conflict nothing is written.
    async fn lock_seats(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
    ) -> Result<LockOutcome, SeatLockError>;

    /// Releases only seats still owned by `owner`. Idempotent.
    async fn release_seats(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
    ) -> Result<(), SeatLockError>;

    /// Atomic LOCKED -> BOOKED hand-off. Requires the lock value to equal
    /// `"<owner>:<request_id>"` exactly.
    async fn confirm_booked(
        &self,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
        booking_id: &str,
    ) -> Result<ConfirmOutcome, SeatLockError>;

    async fn list_locks(&self, showtime_id: &str) -> Result<Vec<LockInfo>, SeatLockError>;

    async fn list_booked(&self, showtime_id: &str) -> Result<Vec<String>, SeatLockError>;
}

// =====================
// Atomic scripts
// =====================

// KEYS layout: [1..n] lock keys, [n+1..2n] booked keys
// value stored as: owner:requestId
// allow lock if the seat is unbooked AND (key empty OR already owned by the
// same owner, prefix match)
const LUA_LOCK_ALL: &str = r#"
local owner = ARGV[1]
local value = ARGV[2]
local ttlMs = tonumber(ARGV[3])
local n = tonumber(ARGV[4])

local function starts_with(str, prefix)
  return string.sub(str, 1, string.len(prefix)) == prefix
end

-- check conflicts first, in input order
for i=1,n do
  if redis.call("EXISTS", KEYS[n+i]) == 1 then
    return {0, KEYS[n+i]}
  end
  local v = redis.call("GET", KEYS[i])
  if v and (not starts_with(v, owner .. ":")) then
    return {0, KEYS[i]}
  end
end

-- lock all
for i=1,n do
  redis.call("SET", KEYS[i], value, "PX", ttlMs)
end

return {1, ""}
"#;

// delete only entries whose value carries the owner: prefix
const LUA_RELEASE_OWNED: &str = r#"
local owner = ARGV[1]

local function starts_with(str, prefix)
  return string.sub(str, 1, string.len(prefix)) == prefix
end

for i=1,#KEYS do
  local v = redis.call("GET", KEYS[i])
  if v and starts_with(v, owner .. ":") then
    redis.call("DEL", KEYS[i])
  end
end
return 1
"#;

// remove expiry members matching "seat|owner|" for any request id
const LUA_ZREM_BY_SEAT_OWNER: &str = r#"
local zkey = KEYS[1]
local owner = ARGV[1]

local members = redis.call("ZRANGE", zkey, 0, -1)

for i=2,#KEYS do
  local seatId = KEYS[i]
  local prefix = seatId .. "|" .. owner .. "|"
  for _,m in ipairs(members) do
    if string.sub(m, 1, string.len(prefix)) == prefix then
      redis.call("ZREM", zkey, m)
    end
  end
end

return 1
"#;

// KEYS layout: [1..n] lock keys, [n+1..2n] booked keys
const LUA_CONFIRM_BOOKED: &str = r#"
local owner = ARGV[1]
local rid = ARGV[2]
local bookingId = ARGV[3]
local n = tonumber(ARGV[4])

local expected = owner .. ":" .. rid

-- First: any seat already booked fails the whole request
for i=1,n do
  local bookedK = KEYS[n+i]
  if redis.call("EXISTS", bookedK) == 1 then
    return {0, bookedK, "already_booked"}
  end
end

-- Second: every lock must exist and equal owner:rid exactly
for i=1,n do
  local lockK = KEYS[i]
  local v = redis.call("GET", lockK)
  if (not v) then
    return {0, lockK, "missing_lock"}
  end
  if v ~= expected then
    return {0, lockK, "not_owner"}
  end
end

-- Finalize: mark booked + delete locks
for i=1,n do
  local lockK = KEYS[i]
  local bookedK = KEYS[n+i]
  redis.call("SET", bookedK, bookingId)
  redis.call("DEL", lockK)
end

return {1, "", ""}
"#;

// =====================
// Redis implementation
// =====================

pub struct SeatLockService {
    client: redis::Client,
    bus: Arc<dyn EventBus>,
    ttl: Duration,
    lock_script: Script,
    release_script: Script,
    zrem_script: Script,
    confirm_script: Script,
}

impl SeatLockService {
    pub fn new(client: redis::Client, bus: Arc<dyn EventBus>, ttl: Duration) -> Self {
        Self {
            client,
            bus,
            ttl,
            lock_script: Script::new(LUA_LOCK_ALL),
            release_script: Script::new(LUA_RELEASE_OWNED),
            zrem_script: Script::new(LUA_ZREM_BY_SEAT_OWNER),
            confirm_script: Script::new(LUA_CONFIRM_BOOKED),
        }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, SeatLockError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    // Expiry-index maintenance is best-effort everywhere: a failure here
    // leaves a stale member the sweeper already tolerates.
    async fn track_expiry(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
    ) {
        let expires_at_ms = Utc::now().timestamp_millis() + self.ttl.as_millis() as i64;
        let zk = exp_zkey(showtime_id);

        let mut pipe = redis::pipe();
        for sid in seat_ids {
            pipe.zadd(&zk, exp_member(sid, owner, request_id), expires_at_ms)
                .ignore();
        }
        let res: Result<(), redis::RedisError> = pipe.query_async(conn).await;
        if let Err(e) = res {
            warn!(showtime_id, "expiry index update failed: {e}");
        }
    }

    async fn untrack_expiry(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        showtime_id: &str,
        seat_ids: &[String],
        owner: &str,
        request_id: &str,
    ) {
        let zk = exp_zkey(showtime_id);

        let mut pipe = redis::pipe();
        for sid in seat_ids {
            pipe.zrem(&zk, exp_member(sid, owner, request_id)).ignore();
        }
        let res: Result<(), redis::RedisError> = pipe.query_async(conn).await;
        if let Err(e) = res {
            warn!(showtime_id, "expiry index cleanup failed: {e}");
        }
    }
}

#[async_trait]
impl LockEngine for SeatLockService {
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
        if owner.is_empty() {
            return Err(SeatLockError::InvalidInput("owner required"));
        }
        if request_id.is_empty() {
            return Err(SeatLockError::InvalidInput("request_id required"));
        }

        let value = format!("{owner}:{request_id}");
        let mut conn = self.conn().await?;

        let mut invocation = self.lock_script.prepare_invoke();
        for sid in seat_ids {
            invocation.key(lock_key(showtime_id, sid));
        }
        for sid in seat_ids {
            invocation.key(booked_key(showtime_id, sid));
        }
        invocation
            .arg(owner)
            .arg(&value)
            .arg(self.ttl.as_millis() as i64)
            .arg(seat_ids.len());

        let (ok, conflicted): (i64, String) = invocation.invoke_async(&mut conn).await?;

        if ok == 1 {
            self.track_expiry(&mut conn, showtime_id, seat_ids, owner, request_id)
                .await;

            publish_seat_event(
                self.bus.as_ref(),
                &SeatEvent::Locked {
                    showtime_id: showtime_id.to_string(),
                    seat_ids: seat_ids.to_vec(),
                    owner: owner.to_string(),
                    request_id: request_id.to_string(),
                    at: Utc::now().timestamp(),
                },
            )
            .await;

            return Ok(LockOutcome::Acquired);
        }

        Ok(LockOutcome::Conflict {
            seat_id: seat_from_key(&conflicted),
        })
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

        let mut conn = self.conn().await?;

        let mut invocation = self.release_script.prepare_invoke();
        for sid in seat_ids {
            invocation.key(lock_key(showtime_id, sid));
        }
        invocation.arg(owner);
        let _: i64 = invocation.invoke_async(&mut conn).await?;

        // drop expiry members for any request id of this owner
        let mut zrem = self.zrem_script.prepare_invoke();
        zrem.key(exp_zkey(showtime_id));
        for sid in seat_ids {
            zrem.key(sid.as_str());
        }
        zrem.arg(owner);
        let res: Result<i64, redis::RedisError> = zrem.invoke_async(&mut conn).await;
        if let Err(e) = res {
            warn!(showtime_id, "expiry index cleanup failed: {e}");
        }

        // Deliberately names the caller's list even if some seats were never
        // ours; consumers must not infer actual deletions from it.
        publish_seat_event(
            self.bus.as_ref(),
            &SeatEvent::Released {
                showtime_id: showtime_id.to_string(),
                seat_ids: seat_ids.to_vec(),
                owner: owner.to_string(),
                at: Utc::now().timestamp(),
            },
        )
        .await;

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

        let mut conn = self.conn().await?;

        let mut invocation = self.confirm_script.prepare_invoke();
        for sid in seat_ids {
            invocation.key(lock_key(showtime_id, sid));
        }
        for sid in seat_ids {
            invocation.key(booked_key(showtime_id, sid));
        }
        invocation
            .arg(owner)
            .arg(request_id)
            .arg(booking_id)
            .arg(seat_ids.len());

        let (ok, conflicted, reason): (i64, String, String) =
            invocation.invoke_async(&mut conn).await?;

        if ok == 1 {
            self.untrack_expiry(&mut conn, showtime_id, seat_ids, owner, request_id)
                .await;

            publish_seat_event(
                self.bus.as_ref(),
                &SeatEvent::Booked {
                    showtime_id: showtime_id.to_string(),
                    seat_ids: seat_ids.to_vec(),
                    owner: owner.to_string(),
                    request_id: request_id.to_string(),
                    booking_id: booking_id.to_string(),
                    at: Utc::now().timestamp(),
                },
            )
            .await;

            return Ok(ConfirmOutcome::Confirmed);
        }

        let reason = ConfirmReason::parse(&reason)
            .ok_or_else(|| SeatLockError::UnexpectedScriptResult(reason.clone()))?;

        // already_booked members would only ever feed the sweeper stale work;
        // missing_lock / not_owner members stay so the sweeper can still
        // observe the real outcome.
        if reason == ConfirmReason::AlreadyBooked {
            self.untrack_expiry(&mut conn, showtime_id, seat_ids, owner, request_id)
                .await;
        }

        Ok(ConfirmOutcome::Rejected {
            seat_id: seat_from_key(&conflicted),
            reason,
        })
    }

    async fn list_locks(&self, showtime_id: &str) -> Result<Vec<LockInfo>, SeatLockError> {
        let pattern = format!("seatlock:{showtime_id}:*");
        let mut conn = self.conn().await?;

        let mut out = Vec::with_capacity(32);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let mut get_pipe = redis::pipe();
                let mut ttl_pipe = redis::pipe();
                for k in &keys {
                    get_pipe.get(k);
                    ttl_pipe.ttl(k);
                }
                let values: Vec<Option<String>> = get_pipe.query_async(&mut conn).await?;
                let ttls: Vec<i64> = ttl_pipe.query_async(&mut conn).await?;

                for ((key, value), ttl) in keys.iter().zip(values).zip(ttls) {
                    // key may have expired between SCAN and GET
                    let Some(value) = value else { continue };

                    let (owner, request_id) = match value.split_once(':') {
                        Some((o, r)) => (o.to_string(), r.to_string()),
                        None => (value.clone(), String::new()),
                    };

                    out.push(LockInfo {
                        seat_id: seat_from_key(key),
                        owner,
                        request_id,
                        ttl_seconds: ttl.max(0),
                    });
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(out)
    }

    async fn list_booked(&self, showtime_id: &str) -> Result<Vec<String>, SeatLockError> {
        let pattern = format!("seatbooked:{showtime_id}:*");
        let mut conn = self.conn().await?;

        let mut out = Vec::with_capacity(64);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;

            out.extend(keys.iter().map(|k| seat_from_key(k)));

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        out.sort();
        Ok(out)
    }
}
