use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::StoreError;
use crate::models::{
    BookingStatus, PricingCategory, Seat, SeatId, Show, ShowId, ShowListing, ShowPricing,
};

use super::{BookingDraft, BookingStore, BookingTx, ShowLayout};

/// Хранилище на Postgres. Взаимное исключение обеспечивает сама БД:
/// блокировка строки сеанса плюс частичный уникальный индекс
/// `seat_bookings (show_id, seat_id) WHERE status = 'active'`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool.clone() }
    }
}

// SET LOCAL не принимает bind-параметры, значение собираем из целого числа
async fn set_local_timeouts(
    tx: &mut Transaction<'static, Postgres>,
    lock_timeout: Duration,
) -> Result<(), StoreError> {
    let ms = lock_timeout.as_millis().max(1);
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", ms))
        .execute(&mut **tx)
        .await?;
    sqlx::query(&format!("SET LOCAL statement_timeout = '{}ms'", ms))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl BookingStore for PgStore {
    type Tx = PgBookingTx;

    async fn load_layout(&self, show_id: ShowId) -> Result<Option<ShowLayout>, StoreError> {
        let show: Option<Show> = sqlx::query_as(
            "SELECT id, movie_id, showroom_id, show_time, base_price_cents, is_booked_out
             FROM shows
             WHERE id = $1",
        )
        .bind(show_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(show) = show else {
            return Ok(None);
        };

        let seats: Vec<Seat> = sqlx::query_as(
            "SELECT id, showroom_id, row_number, seat_number, category_id
             FROM seats
             WHERE showroom_id = $1
             ORDER BY id",
        )
        .bind(show.showroom_id)
        .fetch_all(&self.pool)
        .await?;

        let categories: Vec<PricingCategory> = sqlx::query_as(
            "SELECT id, name, premium_percentage FROM pricing_categories",
        )
        .fetch_all(&self.pool)
        .await?;

        let prices: Vec<ShowPricing> = sqlx::query_as(
            "SELECT show_id, category_id, price_cents FROM show_pricing WHERE show_id = $1",
        )
        .bind(show_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ShowLayout {
            show_id,
            showroom_id: show.showroom_id,
            base_price_cents: show.base_price_cents,
            seats,
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
            category_prices: prices
                .into_iter()
                .map(|p| (p.category_id, p.price_cents))
                .collect::<HashMap<_, _>>(),
        }))
    }

    async fn begin(&self, show_id: ShowId, lock_timeout: Duration) -> Result<PgBookingTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        set_local_timeouts(&mut tx, lock_timeout).await?;

        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM shows WHERE id = $1 FOR UPDATE")
                .bind(show_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(StoreError::Fatal(format!("show {} disappeared", show_id)));
        }

        debug!("Locked show {} for booking", show_id);
        Ok(PgBookingTx { tx })
    }

    async fn booked_seats(
        &self,
        show_id: ShowId,
        lock_timeout: Duration,
    ) -> Result<BTreeSet<SeatId>, StoreError> {
        let mut tx = self.pool.begin().await?;
        set_local_timeouts(&mut tx, lock_timeout).await?;

        // Ждём незавершённые бронирования этого сеанса
        sqlx::query("SELECT id FROM shows WHERE id = $1 FOR SHARE")
            .bind(show_id)
            .execute(&mut *tx)
            .await?;

        let booked: Vec<i64> = sqlx::query_scalar(
            "SELECT seat_id FROM seat_bookings WHERE show_id = $1 AND status = $2",
        )
        .bind(show_id)
        .bind(BookingStatus::Active.as_str())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booked.into_iter().collect())
    }

    async fn active_booking_count(&self, show_id: ShowId) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seat_bookings WHERE show_id = $1 AND status = $2",
        )
        .bind(show_id)
        .bind(BookingStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_upcoming_shows(&self) -> Result<Vec<ShowListing>, StoreError> {
        let shows = sqlx::query_as::<_, ShowListing>(
            r#"
            SELECT
                sh.id AS show_id,
                sh.movie_id,
                m.title AS movie_title,
                sh.showroom_id,
                sh.show_time,
                (SELECT COUNT(*) FROM seats s WHERE s.showroom_id = sh.showroom_id) AS total_seats,
                (SELECT COUNT(*) FROM seat_bookings b
                  WHERE b.show_id = sh.id AND b.status = 'active') AS booked_seats
            FROM shows sh
            JOIN movies m ON m.id = sh.movie_id
            WHERE sh.show_time > LOCALTIMESTAMP
            ORDER BY sh.show_time, sh.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(shows)
    }

    async fn reconcile_sold_out_flags(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Сеансы, которые сейчас бронируются, пропускаем: их флаг
        // выставит транзакция бронирования
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM shows WHERE show_time > LOCALTIMESTAMP FOR UPDATE SKIP LOCKED",
        )
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            WITH derived AS (
                SELECT
                    sh.id,
                    (SELECT COUNT(*) FROM seats s WHERE s.showroom_id = sh.showroom_id) AS total,
                    (SELECT COUNT(*) FROM seat_bookings b
                      WHERE b.show_id = sh.id AND b.status = 'active') AS booked
                FROM shows sh
                WHERE sh.id = ANY($1)
            )
            UPDATE shows
            SET is_booked_out = (d.total > 0 AND d.booked >= d.total)
            FROM derived d
            WHERE shows.id = d.id
              AND shows.is_booked_out <> (d.total > 0 AND d.booked >= d.total)
            "#,
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() > 0 {
            info!("Repaired is_booked_out on {} shows", result.rows_affected());
        }
        Ok(result.rows_affected())
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

impl BookingTx for PgBookingTx {
    async fn taken_seats(
        &mut self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Vec<SeatId>, StoreError> {
        let taken: Vec<i64> = sqlx::query_scalar(
            "SELECT seat_id FROM seat_bookings
             WHERE show_id = $1 AND seat_id = ANY($2) AND status = $3
             ORDER BY seat_id",
        )
        .bind(show_id)
        .bind(seat_ids)
        .bind(BookingStatus::Active.as_str())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(taken)
    }

    async fn insert_bookings(&mut self, draft: &BookingDraft) -> Result<(), StoreError> {
        let seat_ids: Vec<i64> = draft.lines.iter().map(|l| l.seat_id).collect();
        let prices: Vec<i64> = draft.lines.iter().map(|l| l.price_cents).collect();

        sqlx::query(
            r#"
            INSERT INTO seat_bookings
                (booking_ref, show_id, seat_id, user_id, price_cents, status, booking_time)
            SELECT $1, $2, l.seat_id, $3, l.price_cents, $4, $5
            FROM UNNEST($6::BIGINT[], $7::BIGINT[]) AS l(seat_id, price_cents)
            "#,
        )
        .bind(draft.booking_ref)
        .bind(draft.show_id)
        .bind(draft.user_id)
        .bind(BookingStatus::Active.as_str())
        .bind(draft.booking_time)
        .bind(&seat_ids)
        .bind(&prices)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_active(&mut self, show_id: ShowId) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seat_bookings WHERE show_id = $1 AND status = $2",
        )
        .bind(show_id)
        .bind(BookingStatus::Active.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn set_booked_out(&mut self, show_id: ShowId, booked_out: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE shows SET is_booked_out = $2 WHERE id = $1 AND is_booked_out <> $2",
        )
        .bind(show_id)
        .bind(booked_out)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
