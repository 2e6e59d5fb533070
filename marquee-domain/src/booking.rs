use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "BOOKED")]
    Booked,
    #[serde(rename = "FAILED")]
    Failed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Booked => "BOOKED",
            BookingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "BOOKED" => Some(BookingStatus::Booked),
            "FAILED" => Some(BookingStatus::Failed),
            _ => None,
        }
    }
}

/// Booking record created when the user confirms (mock) payment.
/// Lifecycle: PENDING, then exactly one transition to BOOKED or FAILED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub showtime_id: String,
    pub user_id: Uuid,
    pub seat_ids: Vec<String>,
    pub amount: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Fresh PENDING booking with mocked pricing (100 minor units per seat, THB).
    pub fn pending(showtime_id: &str, user_id: Uuid, seat_ids: Vec<String>, request_id: &str) -> Self {
        let now = Utc::now();
        let amount = seat_ids.len() as i64 * 100;
        Booking {
            id: Uuid::new_v4(),
            showtime_id: showtime_id.to_string(),
            user_id,
            seat_ids,
            amount,
            currency: "THB".to_string(),
            status: BookingStatus::Pending,
            request_id: request_id.to_string(),
            payment_ref: None,
            booked_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_booking_prices_per_seat() {
        let b = Booking::pending("st-1", Uuid::new_v4(), vec!["A1".into(), "A2".into()], "r1");
        assert_eq!(b.amount, 200);
        assert_eq!(b.currency, "THB");
        assert_eq!(b.status, BookingStatus::Pending);
        assert!(b.payment_ref.is_none());
        assert!(b.booked_at.is_none());
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&BookingStatus::Booked).unwrap(), "\"BOOKED\"");
        assert_eq!(BookingStatus::parse("FAILED"), Some(BookingStatus::Failed));
        assert_eq!(BookingStatus::parse("failed"), None);
    }
}
