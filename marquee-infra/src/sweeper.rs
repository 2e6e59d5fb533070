use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marquee_domain::events::SeatEvent;
use redis::AsyncCommands;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::bus::{publish_seat_event, EventBus};
use crate::seatlock::{booked_key, lock_key, parse_exp_member};

// Bounds work per showtime per tick so one hot index cannot starve the rest.
const MAX_POPS_PER_INDEX: usize = 200;

/// What to do with an expiry member popped from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SweepAction {
    /// Stale member; the pop already removed it.
    Drop,
    /// Lock still alive; reinsert with the refreshed score.
    Reschedule { expires_at_ms: i64 },
    /// Lock vanished without release or booking: a real timeout.
    EmitTimeout,
}

// The lock key is the source of truth; the index is only a hint.
fn classify(
    now_ms: i64,
    booked_exists: bool,
    lock_value: Option<&str>,
    expected: &str,
    remaining_ttl_ms: i64,
) -> SweepAction {
    if booked_exists {
        return SweepAction::Drop;
    }
    match lock_value {
        Some(v) if v == expected => {
            if remaining_ttl_ms > 0 {
                SweepAction::Reschedule {
                    expires_at_ms: now_ms + remaining_ttl_ms,
                }
            } else {
                SweepAction::Drop
            }
        }
        // ownership changed under this member
        Some(_) => SweepAction::Drop,
        None => SweepAction::EmitTimeout,
    }
}

/// Runs until the shutdown signal fires. Ticks once per second; every Redis
/// error abandons the current member or index and the loop continues.
pub async fn run_timeout_sweeper(
    client: redis::Client,
    bus: Arc<dyn EventBus>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("timeout sweeper started");
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("timeout sweeper stopping");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = sweep_once(&client, bus.as_ref()).await {
                    debug!("sweep aborted: {e}");
                }
            }
        }
    }
}

async fn sweep_once(client: &redis::Client, bus: &dyn EventBus) -> Result<(), redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;

    let mut cursor: u64 = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg("seatlockexp:*")
            .arg("COUNT")
            .arg(50)
            .query_async(&mut conn)
            .await?;

        for zk in &keys {
            let Some(showtime_id) = zk.strip_prefix("seatlockexp:") else {
                continue;
            };
            if let Err(e) = drain_index(&mut conn, bus, showtime_id, zk).await {
                debug!(showtime_id, "index drain aborted: {e}");
            }
        }

        cursor = next;
        if cursor == 0 {
            break;
        }
    }

    Ok(())
}

async fn drain_index(
    conn: &mut redis::aio::MultiplexedConnection,
    bus: &dyn EventBus,
    showtime_id: &str,
    zk: &str,
) -> Result<(), redis::RedisError> {
    for _ in 0..MAX_POPS_PER_INDEX {
        // Atomic pop keeps replicas from double-handling a member.
        let popped: Vec<(String, f64)> = conn.zpopmin(zk, 1).await?;
        let Some((member, score)) = popped.into_iter().next() else {
            return Ok(());
        };

        let now_ms = Utc::now().timestamp_millis();
        if score as i64 > now_ms {
            // not due yet; push it back and leave this index alone this tick
            let _: () = conn.zadd(zk, &member, score).await?;
            return Ok(());
        }

        if let Err(e) = handle_expired(conn, bus, showtime_id, zk, &member).await {
            debug!(member, "expired member abandoned: {e}");
        }
    }
    Ok(())
}

async fn handle_expired(
    conn: &mut redis::aio::MultiplexedConnection,
    bus: &dyn EventBus,
    showtime_id: &str,
    zk: &str,
    member: &str,
) -> Result<(), redis::RedisError> {
    let Some((seat_id, owner, request_id)) = parse_exp_member(member) else {
        // unparseable member; already popped, nothing else to do
        return Ok(());
    };

    let booked_exists: bool = conn.exists(booked_key(showtime_id, seat_id)).await?;
    let lk = lock_key(showtime_id, seat_id);
    let lock_value: Option<String> = conn.get(&lk).await?;
    let remaining_ttl_ms: i64 = if lock_value.is_some() {
        conn.pttl(&lk).await?
    } else {
        0
    };

    let now_ms = Utc::now().timestamp_millis();
    let expected = format!("{owner}:{request_id}");

    match classify(
        now_ms,
        booked_exists,
        lock_value.as_deref(),
        &expected,
        remaining_ttl_ms,
    ) {
        SweepAction::Drop => {}
        SweepAction::Reschedule { expires_at_ms } => {
            let _: () = conn.zadd(zk, member, expires_at_ms).await?;
        }
        SweepAction::EmitTimeout => {
            publish_seat_event(
                bus,
                &SeatEvent::Timeout {
                    showtime_id: showtime_id.to_string(),
                    seat_ids: vec![seat_id.to_string()],
                    owner: owner.to_string(),
                    request_id: request_id.to_string(),
                    at: Utc::now().timestamp(),
                },
            )
            .await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: &str = "user-1:rid-1";

    #[test]
    fn booked_seat_drops_member() {
        let action = classify(1_000, true, Some(EXPECTED), EXPECTED, 5_000);
        assert_eq!(action, SweepAction::Drop);
    }

    #[test]
    fn live_lock_reschedules_with_remaining_ttl() {
        let action = classify(10_000, false, Some(EXPECTED), EXPECTED, 2_500);
        assert_eq!(action, SweepAction::Reschedule { expires_at_ms: 12_500 });
    }

    #[test]
    fn matching_lock_with_spent_ttl_drops() {
        assert_eq!(classify(10_000, false, Some(EXPECTED), EXPECTED, 0), SweepAction::Drop);
        assert_eq!(classify(10_000, false, Some(EXPECTED), EXPECTED, -1), SweepAction::Drop);
    }

    #[test]
    fn ownership_change_drops_member() {
        let action = classify(1_000, false, Some("user-2:rid-7"), EXPECTED, 5_000);
        assert_eq!(action, SweepAction::Drop);
    }

    #[test]
    fn vanished_lock_emits_timeout() {
        let action = classify(1_000, false, None, EXPECTED, 0);
        assert_eq!(action, SweepAction::EmitTimeout);
    }
}
