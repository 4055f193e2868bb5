use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::FixedOffset;
use moka::future::Cache;
use sea_orm::DatabaseConnection;

use crate::config::CacheConfig;
use crate::models::ledger::RankingEntry;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    /// Reference offset for period boundary math, fixed for the deployment.
    pub ledger_offset: FixedOffset,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        ledger_offset: FixedOffset,
    ) -> Self {
        assert!(
            cache.rankings_capacity >= 10,
            "Ranking cache capacity must be configured"
        );
        Self {
            database,
            cache,
            ledger_offset,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiCache {
    pub rankings: Cache<String, Arc<Vec<RankingEntry>>>,
    pub rankings_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.rankings_max_capacity >= 10,
            "Ranking cache capacity threshold"
        );

        let rankings = Cache::builder()
            .max_capacity(config.rankings_max_capacity)
            .time_to_live(Duration::from_secs(config.rankings_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.rankings_ttl_seconds / 2 + 1))
            .build();

        Self {
            rankings,
            rankings_capacity: config.rankings_max_capacity,
        }
    }
}
