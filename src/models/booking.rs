use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{SeatId, ShowId};

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    // Значение колонки seat_bookings.status
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// Запись о брони одного места на один сеанс.
/// Для пары (show_id, seat_id) активной может быть не более одной записи.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatBooking {
    pub id: i64,
    pub booking_ref: Uuid,
    pub show_id: ShowId,
    pub seat_id: SeatId,
    pub user_id: UserId,
    pub price_cents: i64,
    pub status: BookingStatus,
    pub booking_time: DateTime<Utc>,
}

/// Билет: где сидит зритель и сколько это стоит.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub seat_id: SeatId,
    pub row_number: i32,
    pub seat_number: i32,
    pub price_cents: i64,
}

/// Результат успешного `book_seats`: все места одной покупки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_ref: Uuid,
    pub show_id: ShowId,
    pub user_id: UserId,
    pub booking_time: DateTime<Utc>,
    pub tickets: Vec<Ticket>,
    pub total_cents: i64,
    /// Эта покупка выкупила последние места
    pub sold_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked(Booking),
    /// Часть мест уже занята; не забронировано ничего.
    Conflict { unavailable: Vec<SeatId> },
}

impl BookingOutcome {
    pub fn is_booked(&self) -> bool {
        matches!(self, BookingOutcome::Booked(_))
    }
}
