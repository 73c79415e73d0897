use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type CategoryId = i64;

/// Категория места (VIP, диван для двоих и т.п.) с процентной наценкой.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PricingCategory {
    pub id: CategoryId,
    pub name: String,
    pub premium_percentage: i32,
}

/// Цена категории на конкретный сеанс, перекрывает базовую цену сеанса.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowPricing {
    pub show_id: i64,
    pub category_id: CategoryId,
    pub price_cents: i64,
}
