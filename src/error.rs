//! error.rs
//!
//! Таксономия ошибок ядра бронирования.
//!
//! - `ValidationError`: некорректный ввод, отклоняется до открытия транзакции.
//! - `StoreError`: классификация сбоев хранилища (транзиентные, нарушение
//!   уникальности, фатальные).
//! - `BookingError`: то, что видит вызывающий код: валидация, исчерпанные
//!   повторы на фазе чтения, неоднозначный коммит.
//!
//! Конфликт мест ошибкой не является: это штатный `BookingOutcome::Conflict`.

use thiserror::Error;

use crate::models::{SeatId, ShowId};

/// Ошибки входных данных. Всегда исправимы вызывающим.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("seat set must not be empty")]
    EmptySeatSet,
    #[error("seat {0} requested more than once")]
    DuplicateSeat(SeatId),
    #[error("seats {seat_ids:?} do not belong to the showroom of show {show_id}")]
    SeatsNotInShowroom { show_id: ShowId, seat_ids: Vec<SeatId> },
    #[error("show {0} does not exist")]
    UnknownShow(ShowId),
    #[error("user id must be positive, got {0}")]
    InvalidUser(i64),
}

/// Классификация сбоев слоя хранения.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Таймаут, обрыв соединения, сбой сериализации, ожидание блокировки.
    #[error("transient storage failure: {0}")]
    Transient(String),
    /// Сработал уникальный индекс (show_id, seat_id) для активных броней.
    #[error("active booking already exists for the requested seat")]
    UniqueViolation,
    #[error("storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => StoreError::Transient(e.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available, query_canceled
                Some("40001") | Some("40P01") | Some("55P03") | Some("57014") => {
                    StoreError::Transient(e.to_string())
                }
                Some("23505") => StoreError::UniqueViolation,
                _ => StoreError::Fatal(e.to_string()),
            },
            _ => StoreError::Fatal(e.to_string()),
        }
    }
}

/// Ошибки операций ядра бронирования.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Сбой на фазе чтения/проверки после исчерпания повторов.
    #[error("storage temporarily unavailable after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Сбой после того, как вставка уже ушла в хранилище. Не повторяется:
    /// вызывающий обязан перечитать состояние броней.
    #[error("booking outcome unknown for show {show_id}: {reason}")]
    CommitAmbiguous { show_id: ShowId, reason: String },

    /// Сбой хранилища, не подлежащий повтору (например, ошибка схемы).
    #[error(transparent)]
    Storage(StoreError),
}
