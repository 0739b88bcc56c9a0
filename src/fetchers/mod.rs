//! Per-factor fetchers (C5). Each fetcher composes C1 (adapters) → C2
//! (cache, consulted inside the adapters) → C3 (storage) behind a uniform
//! decision flow (spec §4.4): already-cached-in-storage and no `--force`
//! short-circuits; else primary, falling back on empty/failure; a
//! `QuotaExceeded` from fallback propagates so the batch executor (C4)
//! can fast-stop; any other fallback failure degrades to a silent no-op
//! so one ticker never poisons a batch.

pub mod fund_flow;
pub mod growth;
pub mod momentum;
pub mod price;
pub mod quality;
pub mod valuation;

use crate::adapters::{primary::PrimarySource, fallback::FallbackSource, Window};
use crate::cache::ResponseCache;
use crate::config::Config;

pub use crate::adapters::Window as FetchWindow;

/// Shared handles a fetcher needs; cheap to construct once per CLI
/// invocation and passed by reference into each factor module.
pub struct FetchContext {
    pub primary: PrimarySource,
    pub fallback: FallbackSource,
    pub cache: ResponseCache,
}

impl FetchContext {
    pub fn new(config: &Config) -> Self {
        let client = crate::adapters::default_http_client(config.http_timeout_secs);
        let cache = ResponseCache::new(&config.cache_dir);
        Self {
            primary: PrimarySource::new(client.clone(), cache.clone()),
            fallback: FallbackSource::new(client, config.finmind_token.clone(), cache.clone()),
            cache,
        }
    }
}

pub fn default_window(days: i64, today: chrono::NaiveDate) -> Window {
    Window {
        start: today - chrono::Duration::days(days),
        end: today,
    }
}
