//! Progress ledger (spec §4.3): a single JSON file per named task,
//! recording which items have already been processed so a re-run after an
//! interrupt or quota fast-stop can skip them. Written atomically
//! (temp-then-rename), the same pattern as [`crate::cache::ResponseCache`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;

const STALE_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedItem {
    pub item: String,
    pub error: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLedger {
    pub total: usize,
    pub processed: HashSet<String>,
    pub failed: Vec<FailedItem>,
    pub quota_exceeded: bool,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ProgressLedger {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            total,
            processed: HashSet::new(),
            failed: Vec::new(),
            quota_exceeded: false,
            start_time: now,
            last_updated: now,
        }
    }

    /// Loads the ledger at `path`, returning `None` if absent or stale
    /// (older than 7 days) — a stale ledger is treated as if it never
    /// existed, restarting the task from scratch.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let bytes = std::fs::read(path.as_ref()).ok()?;
        let ledger: Self = serde_json::from_slice(&bytes).ok()?;
        let age = Utc::now().signed_duration_since(ledger.last_updated);
        if age.num_days() > STALE_AFTER_DAYS {
            return None;
        }
        Some(ledger)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn mark_processed(&mut self, item: &str) {
        self.processed.insert(item.to_string());
        self.last_updated = Utc::now();
    }

    pub fn mark_failed(&mut self, item: &str, error: &str) {
        self.failed.push(FailedItem {
            item: item.to_string(),
            error: error.to_string(),
            ts: Utc::now(),
        });
        self.last_updated = Utc::now();
    }

    pub fn mark_quota_exceeded(&mut self) {
        self.quota_exceeded = true;
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress_fetch-price.json");

        let mut ledger = ProgressLedger::new(3);
        ledger.mark_processed("2330");
        ledger.mark_failed("2454", "timeout");
        ledger.save(&path).unwrap();

        let loaded = ProgressLedger::load(&path).unwrap();
        assert_eq!(loaded.total, 3);
        assert!(loaded.processed.contains("2330"));
        assert_eq!(loaded.failed.len(), 1);
    }

    #[test]
    fn stale_ledger_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress_stale.json");

        let mut ledger = ProgressLedger::new(1);
        ledger.last_updated = Utc::now() - chrono::Duration::days(8);
        ledger.save(&path).unwrap();

        assert!(ProgressLedger::load(&path).is_none());
    }
}
