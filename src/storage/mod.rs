//! Storage engine (C3): three logical SQLite databases — fundamentals,
//! quality, price — opened as separate [`sqlx::SqlitePool`]s per spec §4.2
//! ("may be one file; the split is historical"). Every write is an
//! idempotent `INSERT ... ON CONFLICT DO UPDATE` keyed on the natural key;
//! replaying a fetch never duplicates rows.

pub mod fundamentals;
pub mod migrations;
pub mod price;
pub mod quality;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::Result;

/// Owns the three pools for the duration of a single CLI invocation.
/// Opened explicitly by `main` and closed before exit; no global/lazy
/// singleton (spec §9 design note: ambient singletons replaced by
/// explicit open/close scoped to a run).
pub struct Storage {
    pub fundamentals: SqlitePool,
    pub quality: SqlitePool,
    pub price: SqlitePool,
}

impl Storage {
    pub async fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.db_path)?;

        let fundamentals = open_pool(&config.fundamentals_db_path()).await?;
        migrations::apply_migrations(&fundamentals, migrations::FUNDAMENTALS_MIGRATIONS).await?;

        let quality = open_pool(&config.quality_db_path()).await?;
        migrations::apply_migrations(&quality, migrations::QUALITY_MIGRATIONS).await?;

        let price = open_pool(&config.price_db_path()).await?;
        migrations::apply_migrations(&price, migrations::PRICE_MIGRATIONS).await?;

        Ok(Self {
            fundamentals,
            quality,
            price,
        })
    }

    pub async fn close(self) {
        self.fundamentals.close().await;
        self.quality.close().await;
        self.price.close().await;
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.fundamentals)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.fundamentals)
        .await?;
        Ok(())
    }
}

async fn open_pool(path: &str) -> Result<SqlitePool> {
    let url = format!("sqlite://{path}?mode=rwc");
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    // WAL keeps concurrent readers (rank/explain) from blocking a writer
    // (fetch) mid-batch (spec §5 shared resources).
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

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
    async fn opens_and_migrates_all_three_databases() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).await;
        let storage = Storage::open(&config).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='valuation'")
                .fetch_all(&storage.fundamentals)
                .await
                .unwrap();
        assert_eq!(tables.len(), 1);

        storage.set_meta("stock_list_updated_at", "2026-07-26").await.unwrap();
        let value = storage.get_meta("stock_list_updated_at").await.unwrap();
        assert_eq!(value.as_deref(), Some("2026-07-26"));

        storage.close().await;
    }
}
