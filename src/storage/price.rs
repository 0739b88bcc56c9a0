//! Queries against `price.db`: daily OHLCV plus a legacy `valuations`
//! mirror written by the Price fetcher's `--type=valuation` path (spec
//! §4.2, §6). The canonical valuation cross-section for scoring lives in
//! `fundamentals.valuation`; see [`crate::storage::fundamentals`].

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{PriceBar, Valuation};

pub async fn upsert_prices(pool: &SqlitePool, rows: &[PriceBar]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO stock_prices (ticker, date, open, high, low, close, volume, turnover)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(ticker, date) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume, turnover = excluded.turnover",
        )
        .bind(&row.ticker)
        .bind(row.date)
        .bind(row.open)
        .bind(row.high)
        .bind(row.low)
        .bind(row.close)
        .bind(row.volume)
        .bind(row.turnover)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn upsert_valuations(pool: &SqlitePool, rows: &[Valuation]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO valuations (ticker, date, per, pbr, dividend_yield)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ticker, date) DO UPDATE SET
                per = excluded.per, pbr = excluded.pbr, dividend_yield = excluded.dividend_yield",
        )
        .bind(&row.ticker)
        .bind(row.date)
        .bind(row.per)
        .bind(row.pbr)
        .bind(row.dividend_yield)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn latest(pool: &SqlitePool, ticker: &str) -> Result<Option<PriceBar>> {
    sqlx::query_as(
        "SELECT ticker, date, open, high, low, close, volume, turnover FROM stock_prices
         WHERE ticker = ?1 ORDER BY date DESC LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn range(pool: &SqlitePool, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<PriceBar>> {
    sqlx::query_as(
        "SELECT ticker, date, open, high, low, close, volume, turnover FROM stock_prices
         WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// All bars on a single date, across tickers. Used for mark-to-market and
/// for the ADTV clip in portfolio construction.
pub async fn cross_section(pool: &SqlitePool, on: NaiveDate) -> Result<Vec<PriceBar>> {
    sqlx::query_as(
        "SELECT ticker, date, open, high, low, close, volume, turnover FROM stock_prices
         WHERE date = ?1",
    )
    .bind(on)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Last bar at or before `on`, per ticker, used for forward-fill in the
/// back-test kernel when a ticker did not trade on `on`.
pub async fn cross_section_as_of(pool: &SqlitePool, as_of: NaiveDate) -> Result<Vec<PriceBar>> {
    sqlx::query_as(
        "SELECT p.ticker, p.date, p.open, p.high, p.low, p.close, p.volume, p.turnover
         FROM stock_prices p
         INNER JOIN (
            SELECT ticker, MAX(date) AS date FROM stock_prices WHERE date <= ?1 GROUP BY ticker
         ) latest ON p.ticker = latest.ticker AND p.date = latest.date",
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Mean daily turnover over the trailing `lookback_days` calendar days,
/// used by the portfolio builder's ADTV clip (spec §4.6).
pub async fn average_daily_turnover(
    pool: &SqlitePool,
    ticker: &str,
    as_of: NaiveDate,
    lookback_days: i64,
) -> Result<Option<f64>> {
    let from = as_of - chrono::Duration::days(lookback_days);
    let row: (Option<f64>,) = sqlx::query_as(
        "SELECT AVG(turnover) FROM stock_prices WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3",
    )
    .bind(ticker)
    .bind(from)
    .bind(as_of)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
