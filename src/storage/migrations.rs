//! Per-database migration ledger (spec §4.2). Each logical database gets
//! its own `meta` table recording applied schema revisions; a migration
//! with a version already present in `meta` is skipped.

use sqlx::SqlitePool;

use crate::error::Result;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static [&'static str],
}

pub async fn apply_migrations(pool: &SqlitePool, migrations: &[Migration]) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for migration in migrations {
        let already_applied: Option<i64> =
            sqlx::query_scalar("SELECT version FROM schema_migrations WHERE version = ?1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;
        if already_applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.sql {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        )
        .bind(migration.version)
        .bind(migration.description)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    Ok(())
}

pub const FUNDAMENTALS_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create valuation, growth_metrics, fund_flow_metrics, momentum_metrics, stock_list",
    sql: &[
        "CREATE TABLE IF NOT EXISTS valuation (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            per REAL,
            pbr REAL,
            dividend_yield REAL,
            PRIMARY KEY (ticker, date)
        )",
        "CREATE TABLE IF NOT EXISTS growth_metrics (
            ticker TEXT NOT NULL,
            month TEXT NOT NULL,
            revenue INTEGER NOT NULL,
            yoy REAL,
            mom REAL,
            eps REAL,
            eps_qoq REAL,
            PRIMARY KEY (ticker, month)
        )",
        "CREATE TABLE IF NOT EXISTS fund_flow_metrics (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            foreign_net INTEGER NOT NULL,
            inv_trust_net INTEGER NOT NULL,
            dealer_net INTEGER NOT NULL,
            PRIMARY KEY (ticker, date)
        )",
        "CREATE TABLE IF NOT EXISTS momentum_metrics (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            rsi14 REAL,
            ma5 REAL,
            ma20 REAL,
            ma60 REAL,
            macd REAL,
            bollinger_upper REAL,
            bollinger_mid REAL,
            bollinger_lower REAL,
            price_change_1m REAL,
            return_52w REAL,
            ma20_above_ma60_days INTEGER NOT NULL,
            PRIMARY KEY (ticker, date)
        )",
        "CREATE TABLE IF NOT EXISTS stock_list (
            ticker TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            industry TEXT,
            market TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_valuation_date ON valuation(date)",
        "CREATE INDEX IF NOT EXISTS idx_growth_month ON growth_metrics(month)",
        "CREATE INDEX IF NOT EXISTS idx_fund_flow_date ON fund_flow_metrics(date)",
        "CREATE INDEX IF NOT EXISTS idx_momentum_date ON momentum_metrics(date)",
    ],
}];

pub const QUALITY_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create quality_metrics",
    sql: &[
        "CREATE TABLE IF NOT EXISTS quality_metrics (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            roe REAL,
            roa REAL,
            gross_margin REAL,
            op_margin REAL,
            net_margin REAL,
            debt_ratio REAL,
            current_ratio REAL,
            eps REAL,
            PRIMARY KEY (ticker, date)
        )",
        "CREATE INDEX IF NOT EXISTS idx_quality_date ON quality_metrics(date)",
    ],
}];

pub const PRICE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create stock_prices, valuations",
    sql: &[
        "CREATE TABLE IF NOT EXISTS stock_prices (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume INTEGER NOT NULL,
            turnover INTEGER NOT NULL,
            PRIMARY KEY (ticker, date)
        )",
        // Legacy mirror of fundamentals.valuation, kept because the
        // Price fetcher's dual-source path (`fetch-price --type=valuation`)
        // writes here directly; scoring reads fundamentals.valuation.
        "CREATE TABLE IF NOT EXISTS valuations (
            ticker TEXT NOT NULL,
            date TEXT NOT NULL,
            per REAL,
            pbr REAL,
            dividend_yield REAL,
            PRIMARY KEY (ticker, date)
        )",
        "CREATE INDEX IF NOT EXISTS idx_stock_prices_date ON stock_prices(date)",
    ],
}];
