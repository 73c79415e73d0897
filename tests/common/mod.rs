#![allow(dead_code)]

use chrono::{Duration, Utc};

use cinema_booking::config::BookingConfig;
use cinema_booking::models::{Movie, PricingCategory, Seat, Show};
use cinema_booking::services::BookingService;
use cinema_booking::store::MemoryStore;

pub const SHOW: i64 = 1;
pub const OTHER_ROOM_SHOW: i64 = 2;
pub const VIP: i64 = 1;

pub fn config() -> BookingConfig {
    BookingConfig {
        tx_timeout_ms: 500,
        read_retries: 3,
        retry_backoff_ms: 1,
        reconcile_interval_secs: 60,
    }
}

fn seat(id: i64, showroom_id: i64, seat_number: i32, category_id: Option<i64>) -> Seat {
    Seat { id, showroom_id, row_number: 1, seat_number, category_id }
}

fn show(id: i64, showroom_id: i64) -> Show {
    Show {
        id,
        movie_id: 1,
        showroom_id,
        show_time: (Utc::now() + Duration::days(1)).naive_utc(),
        base_price_cents: 1000,
        is_booked_out: false,
    }
}

/// Зал 10: места 1..=4 (4 - VIP +50%), сеанс 1.
/// Зал 20: места 5, 6, сеанс 2.
pub async fn cinema() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_movie(Movie {
            id: 1,
            title: "Stalker".to_string(),
            description: None,
            duration_minutes: 161,
            release_date: None,
        });
    store
        .insert_category(PricingCategory { id: VIP, name: "vip".to_string(), premium_percentage: 50 });

    for id in 1..=3 {
        store.insert_seat(seat(id, 10, id as i32, None));
    }
    store.insert_seat(seat(4, 10, 4, Some(VIP)));
    store.insert_seat(seat(5, 20, 1, None));
    store.insert_seat(seat(6, 20, 2, None));

    store.insert_show(show(SHOW, 10)).await;
    store.insert_show(show(OTHER_ROOM_SHOW, 20)).await;
    store
}

pub async fn service() -> (MemoryStore, BookingService<MemoryStore>) {
    let store = cinema().await;
    let service = BookingService::new(store.clone(), config());
    (store, service)
}
