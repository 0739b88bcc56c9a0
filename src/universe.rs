//! Universe service (C12, spec §4.11): maintains the `stock_list` catalog
//! and its staleness stamp. The TWSE catalog is authoritative; the TPEx
//! (OTC) catalog is best-effort and an empty result is acceptable.

use chrono::{DateTime, Utc};

use crate::adapters::primary::PrimarySource;
use crate::error::Result;
use crate::models::StockListing;
use crate::storage::{fundamentals, Storage};

const STALE_AFTER_HOURS: i64 = 24;
const META_KEY: &str = "stock_list_updated_at";

/// True iff the catalog has never been refreshed or is older than 24h.
pub async fn should_update(storage: &Storage) -> Result<bool> {
    let Some(raw) = storage.get_meta(META_KEY).await? else {
        return Ok(true);
    };
    let Ok(stamped) = DateTime::parse_from_rfc3339(&raw) else {
        return Ok(true);
    };
    let age = Utc::now().signed_duration_since(stamped.with_timezone(&Utc));
    Ok(age.num_hours() >= STALE_AFTER_HOURS)
}

/// Pulls TWSE (required) and TPEx (optional) catalogs and upserts both,
/// then stamps the refresh time. TPEx failures are swallowed into an empty
/// catalog rather than propagated, matching the spec's "optional; empty is
/// acceptable" language.
pub async fn refresh(storage: &Storage, primary: &PrimarySource) -> Result<usize> {
    let listed = primary.fetch_company_catalog().await?;
    let otc = primary.fetch_otc_catalog().await.unwrap_or_else(|_| Vec::new());

    let mut all: Vec<StockListing> = listed;
    all.extend(otc);

    fundamentals::upsert_stock_list(&storage.fundamentals, &all).await?;
    storage.set_meta(META_KEY, &Utc::now().to_rfc3339()).await?;

    Ok(all.len())
}

pub async fn list(storage: &Storage) -> Result<Vec<StockListing>> {
    fundamentals::list_stocks(&storage.fundamentals).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn test_config(dir: &std::path::Path) -> Config {
        Config {
            finmind_token: None,
            db_path: dir.to_string_lossy().to_string(),
            cache_dir: dir.to_string_lossy().to_string(),
            progress_dir: dir.to_string_lossy().to_string(),
            fetch_concurrency: 1,
            http_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn should_update_when_never_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).await;
        let storage = Storage::open(&config).await.unwrap();
        assert!(should_update(&storage).await.unwrap());
        storage.close().await;
    }

    #[tokio::test]
    async fn should_not_update_immediately_after_a_fresh_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).await;
        let storage = Storage::open(&config).await.unwrap();
        storage.set_meta(META_KEY, &Utc::now().to_rfc3339()).await.unwrap();
        assert!(!should_update(&storage).await.unwrap());
        storage.close().await;
    }

    #[tokio::test]
    async fn should_update_once_the_stamp_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).await;
        let storage = Storage::open(&config).await.unwrap();
        let stale = Utc::now() - chrono::Duration::hours(25);
        storage.set_meta(META_KEY, &stale.to_rfc3339()).await.unwrap();
        assert!(should_update(&storage).await.unwrap());
        storage.close().await;
    }
}
