//! Batch executor (C4): bounded-concurrency dispatch over an item set with
//! per-item exponential-backoff retry, quota-aware fast-stop, and a
//! resumable JSON progress ledger. Every fetcher (C5) runs its per-ticker
//! work through this executor rather than hand-rolling concurrency.

pub mod progress;
pub mod signals;

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::Result;
use progress::ProgressLedger;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// When false, the first failure (after retries) aborts the whole
    /// batch instead of being recorded and skipped.
    pub skip_on_error: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            skip_on_error: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedItem {
    pub item: String,
    pub error: String,
}

#[derive(Debug)]
pub struct BatchResult<R> {
    pub successful: Vec<(String, R)>,
    pub failed: Vec<FailedItem>,
    pub skipped: Vec<String>,
    pub duration: Duration,
    pub success_rate: f64,
}

enum WorkerOutcome<R> {
    Success(R),
    Failed(String),
    QuotaExceeded,
}

/// Drains `items` through at most `options.concurrency` parallel workers,
/// consulting/updating the progress ledger at `ledger_path`. `task_name`
/// is used only for logging; the ledger file itself is addressed by
/// `ledger_path` directly so callers control layout (spec §6 persisted
/// layout: `data/progress_<session>.json`).
pub async fn run_batch<R, F, Fut>(
    task_name: &str,
    ledger_path: impl AsRef<Path>,
    items: Vec<String>,
    options: ExecutorOptions,
    worker: F,
) -> Result<BatchResult<R>>
where
    R: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let ledger_path = ledger_path.as_ref().to_path_buf();
    let mut ledger =
        ProgressLedger::load(&ledger_path).unwrap_or_else(|| ProgressLedger::new(items.len()));

    let already_done = ledger.processed.len();
    let pending: Vec<String> = items
        .into_iter()
        .filter(|item| !ledger.processed.contains(item))
        .collect();
    info!(
        task = task_name,
        total = pending.len() + already_done,
        skipped_already_done = already_done,
        "starting batch"
    );

    let worker = Arc::new(worker);
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let quota_exceeded = Arc::new(AtomicBool::new(ledger.quota_exceeded));

    let started = Instant::now();
    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    let mut handles = Vec::with_capacity(pending.len());
    for item in pending {
        if quota_exceeded.load(Ordering::SeqCst) {
            skipped.push(item);
            continue;
        }
        let semaphore = semaphore.clone();
        let worker = worker.clone();
        let quota_flag = quota_exceeded.clone();
        let max_retries = options.max_retries;
        let retry_delay = options.retry_delay;
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            if quota_flag.load(Ordering::SeqCst) {
                return (item, None);
            }
            let outcome = fetch_with_retry(item.clone(), worker, max_retries, retry_delay, quota_flag).await;
            (item, Some(outcome))
        }));
    }

    for handle in handles {
        let (item, outcome) = handle.await.expect("worker task panicked");
        match outcome {
            None => skipped.push(item),
            Some(WorkerOutcome::Success(value)) => {
                ledger.mark_processed(&item);
                successful.push((item, value));
            }
            Some(WorkerOutcome::Failed(err)) => {
                warn!(item = %item, error = %err, "item failed after retries");
                ledger.mark_failed(&item, &err);
                failed.push(FailedItem { item, error: err });
                if !options.skip_on_error {
                    ledger.save(&ledger_path)?;
                    return Err(crate::error::AppError::TransientFetchFailure(format!(
                        "aborting batch: {item} exhausted retries and skip_on_error is false"
                    )));
                }
            }
            Some(WorkerOutcome::QuotaExceeded) => {
                ledger.mark_quota_exceeded();
                skipped.push(item);
            }
        }
    }

    // Fast-stop: anything dispatched after the quota flag flipped never
    // ran and was pushed into `skipped` above without touching the ledger.
    ledger.save(&ledger_path)?;

    let duration = started.elapsed();
    let attempted = successful.len() + failed.len();
    let success_rate = if attempted == 0 { 1.0 } else { successful.len() as f64 / attempted as f64 };

    info!(
        task = task_name,
        successful = successful.len(),
        failed = failed.len(),
        skipped = skipped.len(),
        quota_exceeded = quota_exceeded.load(Ordering::SeqCst),
        "batch finished"
    );

    Ok(BatchResult {
        successful,
        failed,
        skipped,
        duration,
        success_rate,
    })
}

async fn fetch_with_retry<R, F, Fut>(
    item: String,
    worker: Arc<F>,
    max_retries: u32,
    retry_delay: Duration,
    quota_flag: Arc<AtomicBool>,
) -> WorkerOutcome<R>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut attempt: u32 = 0;
    loop {
        match worker(item.clone()).await {
            Ok(value) => return WorkerOutcome::Success(value),
            Err(err) if err.is_quota_exceeded() => {
                quota_flag.store(true, Ordering::SeqCst);
                return WorkerOutcome::QuotaExceeded;
            }
            Err(err) => {
                attempt += 1;
                if attempt > max_retries {
                    return WorkerOutcome::Failed(err.to_string());
                }
                let backoff = retry_delay * 2u32.pow(attempt - 1);
                warn!(item = %item, attempt, backoff_ms = backoff.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn succeeds_items_are_recorded_and_ledger_persists() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("progress_test.json");
        let items = vec!["2330".to_string(), "2454".to_string()];

        let result = run_batch(
            "test",
            &ledger_path,
            items,
            ExecutorOptions::default(),
            |item| async move { Ok::<_, AppError>(format!("ok-{item}")) },
        )
        .await
        .unwrap();

        assert_eq!(result.successful.len(), 2);
        assert!(result.failed.is_empty());
        assert_eq!(result.success_rate, 1.0);

        let ledger = ProgressLedger::load(&ledger_path).unwrap();
        assert!(ledger.processed.contains("2330"));
        assert!(ledger.processed.contains("2454"));
    }

    #[tokio::test]
    async fn rerun_skips_already_processed_items() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("progress_test.json");
        let calls = Arc::new(AtomicUsize::new(0));

        run_batch("test", &ledger_path, vec!["2330".into()], ExecutorOptions::default(), {
            let calls = calls.clone();
            move |item| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, AppError>(item) }
            }
        })
        .await
        .unwrap();

        run_batch("test", &ledger_path, vec!["2330".into()], ExecutorOptions::default(), {
            let calls = calls.clone();
            move |item| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, AppError>(item) }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn quota_exceeded_fast_stops_and_skips_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("progress_test.json");
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let options = ExecutorOptions {
            concurrency: 1,
            ..ExecutorOptions::default()
        };

        let result = run_batch("test", &ledger_path, items, options, |item| async move {
            if item == "b" {
                Err(AppError::QuotaExceeded { dataset: "TaiwanStockPrice".into() })
            } else {
                Ok::<_, AppError>(item)
            }
        })
        .await
        .unwrap();

        assert_eq!(result.successful.len(), 1); // "a"
        assert_eq!(result.skipped.len(), 2); // "b" (quota) + "c" (fast-stopped)

        let ledger = ProgressLedger::load(&ledger_path).unwrap();
        assert!(ledger.quota_exceeded);
    }

    #[tokio::test]
    async fn failed_item_retries_then_records_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("progress_test.json");
        let attempts = Arc::new(AtomicUsize::new(0));
        let options = ExecutorOptions {
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
            ..ExecutorOptions::default()
        };

        let result = run_batch("test", &ledger_path, vec!["x".into()], options, {
            let attempts = attempts.clone();
            move |item| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err::<String, _>(AppError::TransientFetchFailure(format!("boom {item}"))) }
            }
        })
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.successful.len(), 0);
    }
}
