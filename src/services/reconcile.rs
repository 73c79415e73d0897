use std::time::Duration;
use tracing::{error, info};

use crate::error::StoreError;
use crate::store::BookingStore;

/// Фоновая сверка флага is_booked_out с фактическими бронями.
///
/// Флаг пишется в той же транзакции, что и бронь, но его могут испортить
/// внешние писатели (ручные правки, импорт). Сверка чинит такие сеансы.
pub struct Reconciler<S> {
    store: S,
}

impl<S: BookingStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn run_once(&self) -> Result<u64, StoreError> {
        let repaired = self.store.reconcile_sold_out_flags().await?;
        if repaired > 0 {
            info!("🔁 Reconciled is_booked_out on {} shows", repaired);
        }
        Ok(repaired)
    }

    /// Бесконечный цикл сверки; запускается через `tokio::spawn`.
    pub async fn run_every(self, interval: Duration) {
        loop {
            if let Err(e) = self.run_once().await {
                error!("Sold-out reconciliation failed: {}", e);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
