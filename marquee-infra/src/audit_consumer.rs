use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use marquee_domain::audit::AuditLog;
use marquee_domain::events::{BookingEvent, SeatEvent};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit_repo::AuditStore;
use crate::bus::{BOOKING_EVENTS_CHANNEL, SEAT_EVENTS_PATTERN};

/// Subscribes to both event channels and persists every message as an audit
/// record. Runs until the shutdown signal fires; a dropped connection is
/// re-subscribed after a short pause.
pub async fn run_audit_consumer(
    client: redis::Client,
    store: Arc<dyn AuditStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("audit consumer started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("audit consumer stopping");
                return;
            }
            res = consume(&client, store.as_ref()) => {
                if let Err(e) = res {
                    warn!("audit consumer disconnected: {e}; resubscribing");
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn consume(
    client: &redis::Client,
    store: &dyn AuditStore,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(SEAT_EVENTS_PATTERN).await?;
    pubsub.subscribe(BOOKING_EVENTS_CHANNEL).await?;

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(_) => continue,
        };
        handle_message(store, &channel, &payload).await;
    }

    Ok(())
}

// Out-of-order delivery is fine: records carry the event's own timestamp.
async fn handle_message(store: &dyn AuditStore, channel: &str, payload: &str) {
    let entry = if channel == BOOKING_EVENTS_CHANNEL {
        match serde_json::from_str::<BookingEvent>(payload) {
            Ok(ev) => booking_audit_entry(&ev, payload),
            Err(e) => {
                debug!(channel, "unparseable booking event: {e}");
                return;
            }
        }
    } else {
        match serde_json::from_str::<SeatEvent>(payload) {
            Ok(ev) => seat_audit_entry(&ev, payload),
            Err(e) => {
                debug!(channel, "unparseable seat event: {e}");
                return;
            }
        }
    };

    if let Err(e) = store.insert(&entry).await {
        warn!(channel, "audit insert failed: {e}");
    }
}

fn event_timestamp(at: i64) -> DateTime<Utc> {
    if at == 0 {
        return Utc::now();
    }
    DateTime::<Utc>::from_timestamp(at, 0).unwrap_or_else(Utc::now)
}

fn raw_payload(payload: &str) -> serde_json::Value {
    serde_json::from_str(payload).unwrap_or(serde_json::Value::Null)
}

fn seat_audit_entry(ev: &SeatEvent, payload: &str) -> AuditLog {
    AuditLog {
        id: Uuid::new_v4(),
        kind: format!("seat.{}", ev.kind()),
        showtime_id: Some(ev.showtime_id().to_string()),
        booking_id: ev.booking_id().map(str::to_string),
        user_id: Some(ev.owner().to_string()),
        seat_ids: ev.seat_ids().to_vec(),
        request_id: ev.request_id().map(str::to_string),
        payload: raw_payload(payload),
        at: event_timestamp(ev.at()),
    }
}

fn booking_audit_entry(ev: &BookingEvent, payload: &str) -> AuditLog {
    let BookingEvent::Success {
        booking_id,
        showtime_id,
        user_id,
        seat_ids,
        at,
        ..
    } = ev;

    AuditLog {
        id: Uuid::new_v4(),
        kind: ev.kind().to_string(),
        showtime_id: Some(showtime_id.clone()),
        booking_id: Some(booking_id.clone()),
        user_id: Some(user_id.clone()),
        seat_ids: seat_ids.clone(),
        request_id: None,
        payload: raw_payload(payload),
        at: event_timestamp(*at),
    }
}
