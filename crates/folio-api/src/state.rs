//! Shared application state.

use std::sync::Arc;

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

use folio_db::{Database, StorageBackend};

use crate::config::ServerConfig;
use crate::services::NoteService;

pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Upload store; holds the files behind image records.
    pub storage: Arc<dyn StorageBackend>,
    /// Base for public image URLs.
    pub public_url: String,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(db: Database, storage: Arc<dyn StorageBackend>, config: &ServerConfig) -> Self {
        Self {
            db,
            storage,
            public_url: config.public_url.clone(),
            rate_limiter: build_rate_limiter(config),
        }
    }

    /// Note write service over this state's database and storage.
    pub fn notes(&self) -> NoteService {
        NoteService::new(self.db.clone(), self.storage.clone())
    }
}

/// Global limiter from the config, or `None` when disabled.
pub fn build_rate_limiter(config: &ServerConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.rate_limit_enabled {
        return None;
    }
    let burst = NonZeroU32::new(config.rate_limit_requests)?;
    let quota = Quota::with_period(Duration::from_secs(config.rate_limit_period_secs))?
        .allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}
