//! store
//!
//! Шов между ядром бронирования и хранилищем. Ядро не знает ни про пул
//! соединений, ни про глобальное состояние: оно получает `BookingStore`
//! явно и открывает через него транзакции.
//!
//! Контракт транзакции (`BookingTx`):
//! - `BookingStore::begin` открывает транзакцию и берёт эксклюзивную
//!   блокировку сеанса; бронирования одного сеанса сериализуются даже между
//!   разными процессами;
//! - записи видны другим только после `commit`;
//! - брошенная без `commit` транзакция откатывается.

pub mod memory;
pub mod postgres;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    CategoryId, PricingCategory, Seat, SeatId, ShowId, ShowListing, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Всё, что нужно знать о сеансе для проверки и расценки запроса:
/// места зала, базовая цена, категории и цены категорий на сеанс.
#[derive(Debug, Clone)]
pub struct ShowLayout {
    pub show_id: ShowId,
    pub showroom_id: i64,
    pub base_price_cents: i64,
    /// Отсортированы по id
    pub seats: Vec<Seat>,
    pub categories: HashMap<CategoryId, PricingCategory>,
    pub category_prices: HashMap<CategoryId, i64>,
}

impl ShowLayout {
    pub fn seat(&self, seat_id: SeatId) -> Option<&Seat> {
        self.seats
            .binary_search_by_key(&seat_id, |s| s.id)
            .ok()
            .map(|idx| &self.seats[idx])
    }

    pub fn seat_ids(&self) -> BTreeSet<SeatId> {
        self.seats.iter().map(|s| s.id).collect()
    }

    pub fn capacity(&self) -> i64 {
        self.seats.len() as i64
    }
}

/// Строки, которые транзакция бронирования вставляет одним пакетом.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub booking_ref: Uuid,
    pub show_id: ShowId,
    pub user_id: UserId,
    pub booking_time: DateTime<Utc>,
    pub lines: Vec<DraftLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub seat_id: SeatId,
    pub price_cents: i64,
}

pub trait BookingStore: Clone + Send + Sync + 'static {
    type Tx: BookingTx;

    /// `None`, если сеанса нет.
    fn load_layout(
        &self,
        show_id: ShowId,
    ) -> impl Future<Output = Result<Option<ShowLayout>, StoreError>> + Send;

    /// Открыть транзакцию и эксклюзивно заблокировать сеанс.
    /// Ожидание блокировки ограничено `lock_timeout`.
    fn begin(
        &self,
        show_id: ShowId,
        lock_timeout: Duration,
    ) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Активные брони сеанса под разделяемой блокировкой: если сейчас
    /// коммитится бронирование, чтение дождётся его завершения.
    fn booked_seats(
        &self,
        show_id: ShowId,
        lock_timeout: Duration,
    ) -> impl Future<Output = Result<BTreeSet<SeatId>, StoreError>> + Send;

    /// Число активных броней по закоммиченному состоянию, без блокировок.
    fn active_booking_count(
        &self,
        show_id: ShowId,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn list_upcoming_shows(
        &self,
    ) -> impl Future<Output = Result<Vec<ShowListing>, StoreError>> + Send;

    /// Пересчитать сохранённые флаги is_booked_out будущих сеансов по
    /// состоянию броней. Возвращает число исправленных сеансов.
    fn reconcile_sold_out_flags(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

pub trait BookingTx: Send {
    /// Какие из `seat_ids` уже имеют активную бронь на сеанс.
    fn taken_seats(
        &mut self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> impl Future<Output = Result<Vec<SeatId>, StoreError>> + Send;

    /// `StoreError::UniqueViolation`, если уникальный индекс отверг строку.
    fn insert_bookings(
        &mut self,
        draft: &BookingDraft,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Число активных броней сеанса с учётом записей этой транзакции.
    fn count_active(
        &mut self,
        show_id: ShowId,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Записать флаг is_booked_out. `true`, если значение изменилось.
    fn set_booked_out(
        &mut self,
        show_id: ShowId,
        booked_out: bool,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
