use crate::redis_client::RedisClient;

pub mod shows;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    show_ttl_secs: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, show_ttl_secs: u64) -> Self {
        Self { redis, show_ttl_secs }
    }
}
