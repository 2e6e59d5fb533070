use serde::{Deserialize, Serialize};

/// Seat state transition broadcast on `seat-events:<showtime>`.
///
/// Wire shape is a flat JSON object tagged by `type`; subscribers dispatch on
/// the tag and ignore fields they don't need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SeatEvent {
    Locked {
        showtime_id: String,
        seat_ids: Vec<String>,
        owner: String,
        request_id: String,
        at: i64,
    },
    Released {
        showtime_id: String,
        seat_ids: Vec<String>,
        owner: String,
        at: i64,
    },
    Booked {
        showtime_id: String,
        seat_ids: Vec<String>,
        owner: String,
        request_id: String,
        booking_id: String,
        at: i64,
    },
    Timeout {
        showtime_id: String,
        seat_ids: Vec<String>,
        owner: String,
        request_id: String,
        at: i64,
    },
}

impl SeatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SeatEvent::Locked { .. } => "locked",
            SeatEvent::Released { .. } => "released",
            SeatEvent::Booked { .. } => "booked",
            SeatEvent::Timeout { .. } => "timeout",
        }
    }

    pub fn showtime_id(&self) -> &str {
        match self {
            SeatEvent::Locked { showtime_id, .. }
            | SeatEvent::Released { showtime_id, .. }
            | SeatEvent::Booked { showtime_id, .. }
            | SeatEvent::Timeout { showtime_id, .. } => showtime_id,
        }
    }

    pub fn seat_ids(&self) -> &[String] {
        match self {
            SeatEvent::Locked { seat_ids, .. }
            | SeatEvent::Released { seat_ids, .. }
            | SeatEvent::Booked { seat_ids, .. }
            | SeatEvent::Timeout { seat_ids, .. } => seat_ids,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            SeatEvent::Locked { owner, .. }
            | SeatEvent::Released { owner, .. }
            | SeatEvent::Booked { owner, .. }
            | SeatEvent::Timeout { owner, .. } => owner,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            SeatEvent::Locked { request_id, .. }
            | SeatEvent::Booked { request_id, .. }
            | SeatEvent::Timeout { request_id, .. } => Some(request_id),
            SeatEvent::Released { .. } => None,
        }
    }

    pub fn booking_id(&self) -> Option<&str> {
        match self {
            SeatEvent::Booked { booking_id, .. } => Some(booking_id),
            _ => None,
        }
    }

    pub fn at(&self) -> i64 {
        match self {
            SeatEvent::Locked { at, .. }
            | SeatEvent::Released { at, .. }
            | SeatEvent::Booked { at, .. }
            | SeatEvent::Timeout { at, .. } => *at,
        }
    }
}

/// Booking lifecycle event broadcast on `booking-events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BookingEvent {
    #[serde(rename = "booking.success")]
    Success {
        booking_id: String,
        showtime_id: String,
        user_id: String,
        seat_ids: Vec<String>,
        amount: i64,
        currency: String,
        at: i64,
    },
}

impl BookingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingEvent::Success { .. } => "booking.success",
        }
    }

    pub fn at(&self) -> i64 {
        match self {
            BookingEvent::Success { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locked_event_wire_shape() {
        let ev = SeatEvent::Locked {
            showtime_id: "st-1".into(),
            seat_ids: vec!["A1".into(), "A2".into()],
            owner: "u1".into(),
            request_id: "r1".into(),
            at: 1700000000,
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "locked");
        assert_eq!(v["showtime_id"], "st-1");
        assert_eq!(v["seat_ids"], json!(["A1", "A2"]));
        assert_eq!(v["at"], 1700000000);
    }

    #[test]
    fn timeout_event_round_trips() {
        let raw = r#"{"type":"timeout","showtime_id":"st-9","seat_ids":["C5"],"owner":"u2","request_id":"r9","at":42}"#;
        let ev: SeatEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev.kind(), "timeout");
        assert_eq!(ev.seat_ids(), ["C5".to_string()]);
        assert_eq!(ev.request_id(), Some("r9"));
        assert_eq!(ev.booking_id(), None);
    }

    #[test]
    fn booking_success_tag_is_dotted() {
        let ev = BookingEvent::Success {
            booking_id: "b1".into(),
            showtime_id: "st-1".into(),
            user_id: "u1".into(),
            seat_ids: vec!["A1".into()],
            amount: 100,
            currency: "THB".into(),
            at: 7,
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "booking.success");
        let back: BookingEvent = serde_json::from_value(v).unwrap();
        assert_eq!(back.kind(), "booking.success");
    }
}
