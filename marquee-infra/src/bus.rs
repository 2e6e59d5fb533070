use async_trait::async_trait;
use marquee_domain::events::{BookingEvent, SeatEvent};
use tracing::warn;

pub type BusResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub fn seat_events_channel(showtime_id: &str) -> String {
    format!("seat-events:{showtime_id}")
}

pub const SEAT_EVENTS_PATTERN: &str = "seat-events:*";
pub const BOOKING_EVENTS_CHANNEL: &str = "booking-events";

/// Narrow publish seam so tests can swap in a recording bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> BusResult;
}

#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
}

impl RedisEventBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: &str, payload: &str) -> BusResult {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Best-effort publish; failures are logged, never surfaced.
pub(crate) async fn publish_seat_event(bus: &dyn EventBus, ev: &SeatEvent) {
    let payload = match serde_json::to_string(ev) {
        Ok(p) => p,
        Err(_) => return,
    };
    let channel = seat_events_channel(ev.showtime_id());
    if let Err(e) = bus.publish(&channel, &payload).await {
        warn!(channel = %channel, "seat event publish failed: {e}");
    }
}

/// Best-effort publish; failures are logged, never surfaced.
pub(crate) async fn publish_booking_event(bus: &dyn EventBus, ev: &BookingEvent) {
    let payload = match serde_json::to_string(ev) {
        Ok(p) => p,
        Err(_) => return,
    };
    if let Err(e) = bus.publish(BOOKING_EVENTS_CHANNEL, &payload).await {
        warn!("booking event publish failed: {e}");
    }
}
