pub mod audit;
pub mod booking;
pub mod events;
pub mod seat;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use events::{BookingEvent, SeatEvent};
pub use user::{User, UserRole};
