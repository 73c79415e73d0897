use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::cache::CacheService;
use crate::error::BookingError;
use crate::models::ShowListing;
use crate::services::BookingService;
use crate::store::BookingStore;

const UPCOMING_SHOWS_KEY: &str = "shows:upcoming";

impl CacheService {
    // Прогрев афиши при старте
    pub async fn warmup_cache<S: BookingStore>(&self, booking: &BookingService<S>) {
        info!("Starting cache warmup...");
        match self.get_upcoming_shows(booking).await {
            Ok(shows) => info!("Loaded {} upcoming shows", shows.len()),
            Err(e) => warn!("Cache warmup failed: {}", e),
        }
    }

    /// Афиша будущих сеансов. Снимок: распроданность по нему не решается,
    /// это делает `BookingService::is_sold_out`.
    pub async fn get_upcoming_shows<S: BookingStore>(
        &self,
        booking: &BookingService<S>,
    ) -> Result<Vec<ShowListing>, BookingError> {
        // Сначала пробуем кеш
        match self.get_shows_from_cache().await {
            Ok(Some(shows)) => return Ok(shows),
            Ok(None) => debug!("Upcoming shows cache miss"),
            Err(e) => warn!("Redis unavailable for shows cache: {}", e),
        }

        // Если кеш не работает - идем в БД
        let shows = booking.list_shows(false).await?;
        if let Err(e) = self.save_shows_to_cache(&shows).await {
            warn!("Failed to cache upcoming shows: {}", e);
        }
        Ok(shows)
    }

    // Сеанс распродан - афиша устарела
    pub async fn invalidate_shows(&self) {
        let mut conn = self.redis.conn.clone();
        let result: Result<(), _> = conn.del(UPCOMING_SHOWS_KEY).await;
        match result {
            Ok(()) => info!("Invalidated upcoming shows cache"),
            Err(e) => warn!("Failed to invalidate upcoming shows cache: {}", e),
        }
    }

    async fn get_shows_from_cache(&self) -> Result<Option<Vec<ShowListing>>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(UPCOMING_SHOWS_KEY).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let shows: Vec<ShowListing> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(Some(shows))
    }

    async fn save_shows_to_cache(&self, shows: &[ShowListing]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(shows).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(UPCOMING_SHOWS_KEY, data, self.show_ttl_secs).await
    }
}
