pub mod movie;
pub mod seat;
pub mod show;
pub mod pricing;
pub mod booking;

pub use movie::Movie;
pub use seat::{Seat, SeatId};
pub use show::{Show, ShowId, ShowListing};
pub use pricing::{CategoryId, PricingCategory, ShowPricing};
pub use booking::{Booking, BookingOutcome, BookingStatus, SeatBooking, Ticket, UserId};
