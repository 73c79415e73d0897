pub mod config;
pub mod database;
pub mod redis_client;
pub mod error;
pub mod models;
pub mod store;
pub mod services;
pub mod cache;
pub mod controllers;
pub mod middleware;

use std::sync::Arc;

use crate::services::BookingService;
use crate::store::PgStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub booking: BookingService<PgStore>,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        tracing::info!("Database connected");

        if config.database.run_migrations {
            db.run_migrations().await?;
        }

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        tracing::info!("Redis connected");

        let cache = cache::CacheService::new(redis, config.redis.show_cache_ttl_secs);
        let booking = BookingService::new(PgStore::new(&db), config.booking.clone());

        Ok(Arc::new(Self {
            db,
            cache,
            booking,
            config,
        }))
    }
}
