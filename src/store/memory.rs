//! memory.rs
//!
//! Хранилище в памяти процесса. Используется в тестах и при встраивании ядра
//! без Postgres. Гарантии те же, что у `PgStore`:
//! - справочники (`Catalog`) читаются без ожидания, как обычный SELECT;
//! - брони и флаги распроданности (`Ledger`) под `tokio::sync::Mutex`;
//!   транзакция держит `OwnedMutexGuard`, поэтому бронирования и чтения
//!   свободных мест сериализуются;
//! - записи транзакции копятся в `staged` и применяются только в `commit`;
//! - `Drop` без `commit` ничего не применяет (откат).
//!
//! Для тестов отказоустойчивости есть инъекция сбоев: `fail_next_reads`,
//! `fail_next_insert_unique` и `fail_next_commit`.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::models::{
    BookingStatus, CategoryId, Movie, PricingCategory, Seat, SeatBooking, SeatId, Show, ShowId,
    ShowListing,
};

use super::{BookingDraft, BookingStore, BookingTx, ShowLayout};

#[derive(Debug, Default)]
struct Catalog {
    movies: HashMap<i64, Movie>,
    seats: HashMap<SeatId, Seat>,
    shows: HashMap<ShowId, Show>,
    categories: HashMap<CategoryId, PricingCategory>,
    show_pricing: HashMap<(ShowId, CategoryId), i64>,
}

impl Catalog {
    fn showroom_seat_count(&self, showroom_id: i64) -> i64 {
        self.seats.values().filter(|s| s.showroom_id == showroom_id).count() as i64
    }

    fn upcoming(&self) -> impl Iterator<Item = &Show> {
        let now = Utc::now().naive_utc();
        self.shows.values().filter(move |s| s.show_time > now)
    }
}

#[derive(Debug, Default)]
struct Ledger {
    bookings: Vec<SeatBooking>,
    booked_out: HashMap<ShowId, bool>,
    next_booking_id: i64,
}

impl Ledger {
    fn active_count(&self, show_id: ShowId) -> i64 {
        self.bookings
            .iter()
            .filter(|b| b.show_id == show_id && b.status == BookingStatus::Active)
            .count() as i64
    }

    fn is_active(&self, show_id: ShowId, seat_id: SeatId) -> bool {
        self.bookings.iter().any(|b| {
            b.show_id == show_id && b.seat_id == seat_id && b.status == BookingStatus::Active
        })
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_reads: AtomicU32,
    failing_commit: AtomicBool,
    failing_insert: AtomicBool,
    layout_loads: AtomicU32,
}

impl Faults {
    fn read_fault(&self, op: &str) -> Result<(), StoreError> {
        let consumed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Transient(format!("injected failure in {}", op))),
            Err(_) => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    catalog: Arc<RwLock<Catalog>>,
    ledger: Arc<Mutex<Ledger>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog_mut(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Наполнение справочников ---

    pub fn insert_movie(&self, movie: Movie) {
        self.catalog_mut().movies.insert(movie.id, movie);
    }

    pub fn insert_seat(&self, seat: Seat) {
        self.catalog_mut().seats.insert(seat.id, seat);
    }

    pub async fn insert_show(&self, show: Show) {
        self.ledger.lock().await.booked_out.insert(show.id, show.is_booked_out);
        self.catalog_mut().shows.insert(show.id, show);
    }

    pub fn insert_category(&self, category: PricingCategory) {
        self.catalog_mut().categories.insert(category.id, category);
    }

    pub fn insert_show_pricing(&self, show_id: ShowId, category_id: CategoryId, price_cents: i64) {
        self.catalog_mut()
            .show_pricing
            .insert((show_id, category_id), price_cents);
    }

    // --- Инспекция состояния ---

    pub async fn active_bookings(&self, show_id: ShowId) -> Vec<SeatBooking> {
        self.ledger
            .lock()
            .await
            .bookings
            .iter()
            .filter(|b| b.show_id == show_id && b.status == BookingStatus::Active)
            .cloned()
            .collect()
    }

    /// Сохранённый флаг is_booked_out, как он лежит в хранилище.
    pub async fn stored_booked_out(&self, show_id: ShowId) -> Option<bool> {
        self.ledger.lock().await.booked_out.get(&show_id).copied()
    }

    /// Перезаписать флаг в обход транзакций (имитация внешнего писателя).
    pub async fn overwrite_booked_out(&self, show_id: ShowId, booked_out: bool) {
        if let Some(flag) = self.ledger.lock().await.booked_out.get_mut(&show_id) {
            *flag = booked_out;
        }
    }

    // --- Инъекция сбоев ---

    /// Следующие `n` операций фазы чтения вернут транзиентную ошибку.
    pub fn fail_next_reads(&self, n: u32) {
        self.faults.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Следующий `commit` вернёт ошибку, ничего не применив.
    pub fn fail_next_commit(&self) {
        self.faults.failing_commit.store(true, Ordering::SeqCst);
    }

    /// Следующая вставка упрётся в уникальный индекс, как будто место
    /// заняли в обход проверки.
    pub fn fail_next_insert_unique(&self) {
        self.faults.failing_insert.store(true, Ordering::SeqCst);
    }

    pub fn layout_loads(&self) -> u32 {
        self.faults.layout_loads.load(Ordering::SeqCst)
    }

    async fn lock_with_timeout(
        &self,
        lock_timeout: Duration,
    ) -> Result<OwnedMutexGuard<Ledger>, StoreError> {
        tokio::time::timeout(lock_timeout, self.ledger.clone().lock_owned())
            .await
            .map_err(|_| StoreError::Transient("lock wait timed out".to_string()))
    }
}

impl BookingStore for MemoryStore {
    type Tx = MemoryTx;

    async fn load_layout(&self, show_id: ShowId) -> Result<Option<ShowLayout>, StoreError> {
        self.faults.layout_loads.fetch_add(1, Ordering::SeqCst);
        self.faults.read_fault("load_layout")?;

        let catalog = self.catalog();
        let Some(show) = catalog.shows.get(&show_id) else {
            return Ok(None);
        };

        let mut seats: Vec<Seat> = catalog
            .seats
            .values()
            .filter(|s| s.showroom_id == show.showroom_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.id);

        Ok(Some(ShowLayout {
            show_id,
            showroom_id: show.showroom_id,
            base_price_cents: show.base_price_cents,
            seats,
            categories: catalog.categories.clone(),
            category_prices: catalog
                .show_pricing
                .iter()
                .filter(|((sid, _), _)| *sid == show_id)
                .map(|((_, cid), price)| (*cid, *price))
                .collect(),
        }))
    }

    async fn begin(&self, show_id: ShowId, lock_timeout: Duration) -> Result<MemoryTx, StoreError> {
        self.faults.read_fault("begin")?;
        let exists = self.catalog().shows.contains_key(&show_id);
        if !exists {
            return Err(StoreError::Fatal(format!("show {} disappeared", show_id)));
        }
        let guard = self.lock_with_timeout(lock_timeout).await?;
        Ok(MemoryTx {
            guard,
            staged: Vec::new(),
            staged_flags: Vec::new(),
            faults: self.faults.clone(),
        })
    }

    async fn booked_seats(
        &self,
        show_id: ShowId,
        lock_timeout: Duration,
    ) -> Result<BTreeSet<SeatId>, StoreError> {
        self.faults.read_fault("booked_seats")?;
        let ledger = self.lock_with_timeout(lock_timeout).await?;
        Ok(ledger
            .bookings
            .iter()
            .filter(|b| b.show_id == show_id && b.status == BookingStatus::Active)
            .map(|b| b.seat_id)
            .collect())
    }

    async fn active_booking_count(&self, show_id: ShowId) -> Result<i64, StoreError> {
        self.faults.read_fault("active_booking_count")?;
        Ok(self.ledger.lock().await.active_count(show_id))
    }

    async fn list_upcoming_shows(&self) -> Result<Vec<ShowListing>, StoreError> {
        let ledger = self.ledger.lock().await;
        let catalog = self.catalog();

        let mut listings: Vec<ShowListing> = catalog
            .upcoming()
            .map(|s| ShowListing {
                show_id: s.id,
                movie_id: s.movie_id,
                movie_title: catalog
                    .movies
                    .get(&s.movie_id)
                    .map(|m| m.title.clone())
                    .unwrap_or_default(),
                showroom_id: s.showroom_id,
                show_time: s.show_time,
                total_seats: catalog.showroom_seat_count(s.showroom_id),
                booked_seats: ledger.active_count(s.id),
            })
            .collect();
        listings.sort_by_key(|l| (l.show_time, l.show_id));
        Ok(listings)
    }

    async fn reconcile_sold_out_flags(&self) -> Result<u64, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let catalog = self.catalog();

        let mut repaired = 0;
        for show in catalog.upcoming() {
            let total = catalog.showroom_seat_count(show.showroom_id);
            let derived = total > 0 && ledger.active_count(show.id) >= total;
            let flag = ledger.booked_out.entry(show.id).or_insert(false);
            if *flag != derived {
                *flag = derived;
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Ledger>,
    staged: Vec<SeatBooking>,
    staged_flags: Vec<(ShowId, bool)>,
    faults: Arc<Faults>,
}

impl MemoryTx {
    fn staged_active(&self, show_id: ShowId, seat_id: SeatId) -> bool {
        self.staged
            .iter()
            .any(|b| b.show_id == show_id && b.seat_id == seat_id)
    }
}

impl BookingTx for MemoryTx {
    async fn taken_seats(
        &mut self,
        show_id: ShowId,
        seat_ids: &[SeatId],
    ) -> Result<Vec<SeatId>, StoreError> {
        self.faults.read_fault("taken_seats")?;
        let mut taken: Vec<SeatId> = seat_ids
            .iter()
            .copied()
            .filter(|id| self.guard.is_active(show_id, *id) || self.staged_active(show_id, *id))
            .collect();
        taken.sort_unstable();
        Ok(taken)
    }

    async fn insert_bookings(&mut self, draft: &BookingDraft) -> Result<(), StoreError> {
        if self.faults.failing_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::UniqueViolation);
        }

        // Аналог частичного уникального индекса: вся пачка или ничего
        let violates = draft.lines.iter().any(|line| {
            self.guard.is_active(draft.show_id, line.seat_id)
                || self.staged_active(draft.show_id, line.seat_id)
        });
        if violates {
            return Err(StoreError::UniqueViolation);
        }

        for line in &draft.lines {
            self.guard.next_booking_id += 1;
            let id = self.guard.next_booking_id;
            self.staged.push(SeatBooking {
                id,
                booking_ref: draft.booking_ref,
                show_id: draft.show_id,
                seat_id: line.seat_id,
                user_id: draft.user_id,
                price_cents: line.price_cents,
                status: BookingStatus::Active,
                booking_time: draft.booking_time,
            });
        }
        Ok(())
    }

    async fn count_active(&mut self, show_id: ShowId) -> Result<i64, StoreError> {
        let staged = self.staged.iter().filter(|b| b.show_id == show_id).count() as i64;
        Ok(self.guard.active_count(show_id) + staged)
    }

    async fn set_booked_out(&mut self, show_id: ShowId, booked_out: bool) -> Result<bool, StoreError> {
        let current = self
            .staged_flags
            .iter()
            .rev()
            .find(|(id, _)| *id == show_id)
            .map(|(_, flag)| *flag)
            .or_else(|| self.guard.booked_out.get(&show_id).copied())
            .ok_or_else(|| StoreError::Fatal(format!("show {} disappeared", show_id)))?;

        self.staged_flags.push((show_id, booked_out));
        Ok(current != booked_out)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.faults.failing_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transient("injected commit failure".to_string()));
        }

        let staged = std::mem::take(&mut self.staged);
        self.guard.bookings.extend(staged);
        for (show_id, flag) in std::mem::take(&mut self.staged_flags) {
            self.guard.booked_out.insert(show_id, flag);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
