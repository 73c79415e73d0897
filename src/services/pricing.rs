//! pricing.rs
//!
//! Расчёт цены места на сеанс.
//!
//! База: цена категории места на этот сеанс (`show_pricing`), если владелец
//! её задал, иначе базовая цена сеанса. К базе применяется наценка категории
//! в процентах, округление половины вверх до целого цента.

use serde::Serialize;

use crate::models::{Seat, SeatId};
use crate::store::ShowLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatQuote {
    pub seat_id: SeatId,
    pub row_number: i32,
    pub seat_number: i32,
    pub category: Option<String>,
    pub price_cents: i64,
}

/// `base * (100 + premium) / 100`, половина цента округляется вверх.
pub fn apply_premium(base_cents: i64, premium_percentage: i32) -> i64 {
    let scaled = base_cents * (100 + i64::from(premium_percentage));
    (scaled + 50).div_euclid(100)
}

pub fn price_for(layout: &ShowLayout, seat: &Seat) -> i64 {
    let Some(category_id) = seat.category_id else {
        return layout.base_price_cents;
    };

    let base = layout
        .category_prices
        .get(&category_id)
        .copied()
        .unwrap_or(layout.base_price_cents);
    let premium = layout
        .categories
        .get(&category_id)
        .map(|c| c.premium_percentage)
        .unwrap_or(0);

    apply_premium(base, premium)
}

pub fn quote_seat(layout: &ShowLayout, seat: &Seat) -> SeatQuote {
    SeatQuote {
        seat_id: seat.id,
        row_number: seat.row_number,
        seat_number: seat.seat_number,
        category: seat
            .category_id
            .and_then(|id| layout.categories.get(&id))
            .map(|c| c.name.clone()),
        price_cents: price_for(layout, seat),
    }
}
