use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type SeatId = i64;

/// Физическое место в зале. Одно и то же место переиспользуется всеми
/// сеансами этого зала, поэтому привязки к сеансу здесь нет.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub showroom_id: i64,
    pub row_number: i32,
    pub seat_number: i32,
    pub category_id: Option<i64>,
}
