//! File-backed response cache (C2). Keys are a stable hash of
//! `(dataset, params)`; entries carry their own TTL so the cache never
//! needs a separate expiry sweep — expiry is checked on read.
//!
//! Writes go to a temp file in the same directory, then `rename` into
//! place, so concurrent writers to the same key can race but never hand a
//! reader a half-written file (spec §5 "Shared resources").

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Price,
    Valuation,
    MonthlyRevenue,
    FinancialStatements,
    BalanceSheet,
    InstitutionalFlow,
    CompanyInfo,
}

impl Dataset {
    /// Default TTL per spec §4.1: 30 min default, 1 day for price/valuation
    /// snapshots, 3h for institutional-flow monthly batches.
    pub fn default_ttl_ms(&self) -> u64 {
        match self {
            Dataset::Price | Dataset::Valuation => 24 * 60 * 60 * 1000,
            Dataset::InstitutionalFlow => 3 * 60 * 60 * 1000,
            _ => 30 * 60 * 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    inserted_at_ms: u64,
    ttl_ms: u64,
}

#[derive(Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cache_key(dataset: Dataset, params: &(impl Hash + ?Sized)) -> String {
        let mut hasher = DefaultHasher::new();
        dataset.hash(&mut hasher);
        params.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Returns `None` on a miss: absent file, expired TTL (the stale file
    /// is deleted), or a corrupt/unparseable file (also deleted).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let bytes = std::fs::read(&path).ok()?;
        let entry: CacheEntry<T> = match serde_json::from_slice(&bytes) {
            Ok(e) => e,
            Err(_) => {
                std::fs::remove_file(&path).ok();
                return None;
            }
        };
        let now = now_ms();
        if now.saturating_sub(entry.inserted_at_ms) > entry.ttl_ms {
            std::fs::remove_file(&path).ok();
            return None;
        }
        Some(entry.data)
    }

    /// Write only on successful responses; atomic via temp-then-rename.
    pub fn put<T: Serialize>(&self, key: &str, data: &T, ttl_ms: u64) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            data,
            inserted_at_ms: now_ms(),
            ttl_ms,
        };
        let bytes = serde_json::to_vec(&entry)?;
        let tmp_path = self.path_for(&format!("{key}.tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, self.path_for(key))?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn roc_to_gregorian_year(roc_year: i32) -> i32 {
    roc_year + 1911
}

/// Parse an upstream numeric string: strips thousands separators and maps
/// `"-"`/`"N/A"`/empty to `None` (which callers then treat as `0` per
/// spec §4.1, or leave `None` where the field is genuinely nullable).
pub fn parse_upstream_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("n/a") {
        return None;
    }
    trimmed.replace(',', "").parse::<f64>().ok()
}

pub fn path_exists(p: impl AsRef<Path>) -> bool {
    p.as_ref().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_roundtrip_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let key = ResponseCache::cache_key(Dataset::Price, "2330,2024-01");
        cache.put(&key, &vec![1, 2, 3], 60_000).unwrap();

        let a: Vec<i32> = cache.get(&key).unwrap();
        let b: Vec<i32> = cache.get(&key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, vec![1, 2, 3]);
    }

    #[test]
    fn cache_expires_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let key = ResponseCache::cache_key(Dataset::Valuation, "2330");
        cache.put(&key, &42, 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let miss: Option<i32> = cache.get(&key);
        assert!(miss.is_none());
        assert!(!cache.path_for(&key).exists());
    }

    #[test]
    fn corrupt_entry_is_deleted_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path());
        let key = "corrupt";
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(cache.path_for(key), b"not json").unwrap();
        let miss: Option<i32> = cache.get(key);
        assert!(miss.is_none());
        assert!(!cache.path_for(key).exists());
    }

    #[test]
    fn parses_upstream_number_quirks() {
        assert_eq!(parse_upstream_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_upstream_number("-"), None);
        assert_eq!(parse_upstream_number("N/A"), None);
        assert_eq!(parse_upstream_number(""), None);
        assert_eq!(parse_upstream_number("12.3"), Some(12.3));
    }

    #[test]
    fn roc_date_conversion() {
        assert_eq!(roc_to_gregorian_year(113), 2024);
    }
}
