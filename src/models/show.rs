use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::NaiveDateTime;

pub type ShowId = i64;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub movie_id: i64,
    pub showroom_id: i64,
    pub show_time: NaiveDateTime,
    pub base_price_cents: i64,
    /// Кеш. Истиной не является, пересчитывается в транзакции бронирования.
    pub is_booked_out: bool,
}

// Строка афиши: сеанс + фильм + заполненность зала
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShowListing {
    pub show_id: ShowId,
    pub movie_id: i64,
    pub movie_title: String,
    pub showroom_id: i64,
    pub show_time: NaiveDateTime,
    pub total_seats: i64,
    pub booked_seats: i64,
}

impl ShowListing {
    pub fn is_sold_out(&self) -> bool {
        self.total_seats > 0 && self.booked_seats >= self.total_seats
    }
}
