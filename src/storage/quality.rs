//! Queries against `quality.db` (spec §4.2, §4.4 Quality).

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Quality;

pub async fn upsert_quality(pool: &SqlitePool, rows: &[Quality]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO quality_metrics
                (ticker, date, roe, roa, gross_margin, op_margin, net_margin, debt_ratio,
                 current_ratio, eps)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(ticker, date) DO UPDATE SET
                roe = excluded.roe, roa = excluded.roa, gross_margin = excluded.gross_margin,
                op_margin = excluded.op_margin, net_margin = excluded.net_margin,
                debt_ratio = excluded.debt_ratio, current_ratio = excluded.current_ratio,
                eps = excluded.eps",
        )
        .bind(&row.ticker)
        .bind(row.date)
        .bind(row.roe)
        .bind(row.roa)
        .bind(row.gross_margin)
        .bind(row.op_margin)
        .bind(row.net_margin)
        .bind(row.debt_ratio)
        .bind(row.current_ratio)
        .bind(row.eps)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn latest(pool: &SqlitePool, ticker: &str) -> Result<Option<Quality>> {
    sqlx::query_as(
        "SELECT ticker, date, roe, roa, gross_margin, op_margin, net_margin, debt_ratio,
                current_ratio, eps
         FROM quality_metrics WHERE ticker = ?1 ORDER BY date DESC LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn range(pool: &SqlitePool, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Quality>> {
    sqlx::query_as(
        "SELECT ticker, date, roe, roa, gross_margin, op_margin, net_margin, debt_ratio,
                current_ratio, eps
         FROM quality_metrics WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn cross_section(pool: &SqlitePool, as_of: NaiveDate) -> Result<Vec<Quality>> {
    sqlx::query_as(
        "SELECT q.ticker, q.date, q.roe, q.roa, q.gross_margin, q.op_margin, q.net_margin,
                q.debt_ratio, q.current_ratio, q.eps
         FROM quality_metrics q
         INNER JOIN (
            SELECT ticker, MAX(date) AS date FROM quality_metrics WHERE date <= ?1 GROUP BY ticker
         ) latest ON q.ticker = latest.ticker AND q.date = latest.date",
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
