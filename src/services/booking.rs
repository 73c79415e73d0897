//! booking.rs
//!
//! Ядро бронирования мест.
//!
//! Главный инвариант: на пару (show_id, seat_id) приходится не более одной
//! активной брони. Ядро не держит собственных блокировок: взаимное исключение
//! обеспечивает хранилище (блокировка сеанса внутри транзакции и уникальный
//! индекс), поэтому гарантия действует между разными процессами.
//!
//! Операции:
//! - `get_available_seats` / `available_seat_details`: свободные места;
//!   чтение ждёт завершения идущего бронирования этого сеанса;
//! - `book_seats`: атомарная покупка набора мест: все или ни одного;
//! - `is_sold_out`: пересчитывается по броням, сохранённому флагу не верит;
//! - `quote`: цены мест без бронирования;
//! - `list_shows`: афиша будущих сеансов.
//!
//! Повторы: транзиентные сбои фазы чтения повторяются с экспоненциальной
//! задержкой. После того как вставка ушла в хранилище, любой сбой
//! возвращается как `CommitAmbiguous` и не повторяется.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::BookingConfig;
use crate::error::{BookingError, StoreError, ValidationError};
use crate::models::{
    Booking, BookingOutcome, Seat, SeatId, ShowId, ShowListing, Ticket, UserId,
};
use crate::services::pricing::{self, SeatQuote};
use crate::store::{BookingDraft, BookingStore, BookingTx, DraftLine, ShowLayout};

/// Где была попытка бронирования в момент сбоя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Writing,
}

#[derive(Clone)]
pub struct BookingService<S> {
    store: S,
    config: BookingConfig,
}

/// Пустой набор и дубликаты отклоняются до любого обращения к хранилищу.
pub fn validate_seat_set(seat_ids: &[SeatId]) -> Result<Vec<SeatId>, ValidationError> {
    if seat_ids.is_empty() {
        return Err(ValidationError::EmptySeatSet);
    }
    let mut seen = BTreeSet::new();
    for &seat_id in seat_ids {
        if !seen.insert(seat_id) {
            return Err(ValidationError::DuplicateSeat(seat_id));
        }
    }
    Ok(seen.into_iter().collect())
}

/// Все места должны принадлежать залу сеанса.
fn resolve_seats<'a>(
    layout: &'a ShowLayout,
    seat_ids: &[SeatId],
) -> Result<Vec<&'a Seat>, ValidationError> {
    let mut seats = Vec::with_capacity(seat_ids.len());
    let mut foreign = Vec::new();
    for &seat_id in seat_ids {
        match layout.seat(seat_id) {
            Some(seat) => seats.push(seat),
            None => foreign.push(seat_id),
        }
    }
    if !foreign.is_empty() {
        return Err(ValidationError::SeatsNotInShowroom {
            show_id: layout.show_id,
            seat_ids: foreign,
        });
    }
    Ok(seats)
}

impl<S: BookingStore> BookingService<S> {
    pub fn new(store: S, config: BookingConfig) -> Self {
        Self { store, config }
    }

    // Повтор операции фазы чтения при транзиентных сбоях
    async fn with_read_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, BookingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.config.read_retries => {
                    let delay = self.config.retry_delay(attempt);
                    warn!("{} failed (attempt {}), retrying in {:?}: {}", op, attempt, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    error!("{} failed after {} attempts: {}", op, attempt, e);
                    return Err(BookingError::Transient { attempts: attempt, source: e });
                }
                Err(e) => return Err(BookingError::Storage(e)),
            }
        }
    }

    async fn layout(&self, show_id: ShowId) -> Result<ShowLayout, BookingError> {
        self.with_read_retry("load_layout", || self.store.load_layout(show_id))
            .await?
            .ok_or_else(|| ValidationError::UnknownShow(show_id).into())
    }

    /// Свободные места сеанса.
    pub async fn get_available_seats(&self, show_id: ShowId) -> Result<BTreeSet<SeatId>, BookingError> {
        let layout = self.layout(show_id).await?;
        let booked = self
            .with_read_retry("booked_seats", || {
                self.store.booked_seats(show_id, self.config.tx_timeout())
            })
            .await?;
        Ok(layout.seat_ids().difference(&booked).copied().collect())
    }

    /// Свободные места с рядом, номером, категорией и ценой.
    pub async fn available_seat_details(&self, show_id: ShowId) -> Result<Vec<SeatQuote>, BookingError> {
        let layout = self.layout(show_id).await?;
        let booked = self
            .with_read_retry("booked_seats", || {
                self.store.booked_seats(show_id, self.config.tx_timeout())
            })
            .await?;
        Ok(layout
            .seats
            .iter()
            .filter(|seat| !booked.contains(&seat.id))
            .map(|seat| pricing::quote_seat(&layout, seat))
            .collect())
    }

    /// Распродан ли сеанс. Считается по активным броням.
    /// Зал без мест распроданным не считается.
    pub async fn is_sold_out(&self, show_id: ShowId) -> Result<bool, BookingError> {
        let layout = self.layout(show_id).await?;
        let booked = self
            .with_read_retry("active_booking_count", || self.store.active_booking_count(show_id))
            .await?;
        Ok(layout.capacity() > 0 && booked >= layout.capacity())
    }

    pub async fn quote(&self, show_id: ShowId, seat_ids: &[SeatId]) -> Result<Vec<SeatQuote>, BookingError> {
        let seat_ids = validate_seat_set(seat_ids)?;
        let layout = self.layout(show_id).await?;
        let seats = resolve_seats(&layout, &seat_ids)?;
        Ok(seats.into_iter().map(|seat| pricing::quote_seat(&layout, seat)).collect())
    }

    pub async fn list_shows(&self, only_available: bool) -> Result<Vec<ShowListing>, BookingError> {
        let shows = self
            .with_read_retry("list_upcoming_shows", || self.store.list_upcoming_shows())
            .await?;
        Ok(shows
            .into_iter()
            .filter(|s| !only_available || !s.is_sold_out())
            .collect())
    }

    /// Забронировать все места набора для пользователя или ни одного.
    ///
    /// Занятые места возвращаются как `BookingOutcome::Conflict`, это не ошибка.
    pub async fn book_seats(
        &self,
        show_id: ShowId,
        seat_ids: &[SeatId],
        user_id: UserId,
    ) -> Result<BookingOutcome, BookingError> {
        let seat_ids = validate_seat_set(seat_ids)?;
        if user_id <= 0 {
            return Err(ValidationError::InvalidUser(user_id).into());
        }

        let layout = self.layout(show_id).await?;
        let seats = resolve_seats(&layout, &seat_ids)?;

        let draft = BookingDraft {
            booking_ref: Uuid::new_v4(),
            show_id,
            user_id,
            booking_time: Utc::now(),
            lines: seats
                .iter()
                .map(|seat| DraftLine {
                    seat_id: seat.id,
                    price_cents: pricing::price_for(&layout, seat),
                })
                .collect(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut phase = Phase::Reading;
            let result = tokio::time::timeout(
                self.config.tx_timeout(),
                self.attempt_booking(&layout, &seats, &draft, &mut phase),
            )
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Transient(format!(
                    "booking attempt exceeded {:?}",
                    self.config.tx_timeout()
                )))
            });

            let err = match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };

            if phase == Phase::Writing {
                error!(
                    "Booking {} for show {} has unknown outcome: {}",
                    draft.booking_ref, show_id, err
                );
                return Err(BookingError::CommitAmbiguous {
                    show_id,
                    reason: err.to_string(),
                });
            }

            if !err.is_transient() {
                return Err(BookingError::Storage(err));
            }
            if attempt > self.config.read_retries {
                error!("Booking for show {} failed after {} attempts: {}", show_id, attempt, err);
                return Err(BookingError::Transient { attempts: attempt, source: err });
            }

            let delay = self.config.retry_delay(attempt);
            warn!(
                "Booking read phase for show {} failed (attempt {}), retrying in {:?}: {}",
                show_id, attempt, delay, err
            );
            tokio::time::sleep(delay).await;
        }
    }

    // Одна транзакция: блокировка сеанса, проверка, вставка, флаг, коммит
    async fn attempt_booking(
        &self,
        layout: &ShowLayout,
        seats: &[&Seat],
        draft: &BookingDraft,
        phase: &mut Phase,
    ) -> Result<BookingOutcome, StoreError> {
        let show_id = draft.show_id;
        let seat_ids: Vec<SeatId> = draft.lines.iter().map(|l| l.seat_id).collect();

        let mut tx = self.store.begin(show_id, self.config.tx_timeout()).await?;

        let taken = tx.taken_seats(show_id, &seat_ids).await?;
        if !taken.is_empty() {
            if let Err(e) = tx.rollback().await {
                warn!("Rollback after conflict on show {} failed: {}", show_id, e);
            }
            info!("Seats {:?} of show {} already booked", taken, show_id);
            return Ok(BookingOutcome::Conflict { unavailable: taken });
        }

        *phase = Phase::Writing;
        match tx.insert_bookings(draft).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation) => {
                // Ничего не закоммичено, так что это обычный конфликт
                *phase = Phase::Reading;
                if let Err(e) = tx.rollback().await {
                    warn!("Rollback after unique violation on show {} failed: {}", show_id, e);
                }
                let booked = self.store.booked_seats(show_id, self.config.tx_timeout()).await?;
                let mut unavailable: Vec<SeatId> =
                    seat_ids.iter().copied().filter(|id| booked.contains(id)).collect();
                if unavailable.is_empty() {
                    unavailable = seat_ids;
                }
                warn!("Unique index rejected booking on show {}: seats {:?}", show_id, unavailable);
                return Ok(BookingOutcome::Conflict { unavailable });
            }
            Err(e) => return Err(e),
        }

        let active = tx.count_active(show_id).await?;
        let sold_out = layout.capacity() > 0 && active >= layout.capacity();
        tx.set_booked_out(show_id, sold_out).await?;
        tx.commit().await?;

        let tickets: Vec<Ticket> = seats
            .iter()
            .zip(&draft.lines)
            .map(|(seat, line)| Ticket {
                seat_id: seat.id,
                row_number: seat.row_number,
                seat_number: seat.seat_number,
                price_cents: line.price_cents,
            })
            .collect();
        let total_cents = tickets.iter().map(|t| t.price_cents).sum();

        info!(
            "Booked {} seats on show {} for user {} (ref {})",
            tickets.len(),
            show_id,
            draft.user_id,
            draft.booking_ref
        );
        if sold_out {
            info!("Show {} is sold out", show_id);
        }

        Ok(BookingOutcome::Booked(Booking {
            booking_ref: draft.booking_ref,
            show_id,
            user_id: draft.user_id,
            booking_time: draft.booking_time,
            tickets,
            total_cents,
            sold_out,
        }))
    }
}
