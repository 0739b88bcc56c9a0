//! Queries against `fundamentals.db`: valuation, growth, fund-flow,
//! momentum and the stock-list catalog (spec §4.2, §4.11).

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{FundFlow, Market, MomentumSnapshot, MonthlyRevenue, StockListing, Valuation};

pub async fn upsert_valuations(pool: &SqlitePool, rows: &[Valuation]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO valuation (ticker, date, per, pbr, dividend_yield)
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

pub async fn upsert_growth(pool: &SqlitePool, rows: &[MonthlyRevenue]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO growth_metrics (ticker, month, revenue, yoy, mom, eps, eps_qoq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(ticker, month) DO UPDATE SET
                revenue = excluded.revenue, yoy = excluded.yoy, mom = excluded.mom,
                eps = excluded.eps, eps_qoq = excluded.eps_qoq",
        )
        .bind(&row.ticker)
        .bind(row.month)
        .bind(row.revenue)
        .bind(row.yoy)
        .bind(row.mom)
        .bind(row.eps)
        .bind(row.eps_qoq)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn upsert_fund_flow(pool: &SqlitePool, rows: &[FundFlow]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO fund_flow_metrics (ticker, date, foreign_net, inv_trust_net, dealer_net)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ticker, date) DO UPDATE SET
                foreign_net = excluded.foreign_net, inv_trust_net = excluded.inv_trust_net,
                dealer_net = excluded.dealer_net",
        )
        .bind(&row.ticker)
        .bind(row.date)
        .bind(row.foreign_net)
        .bind(row.inv_trust_net)
        .bind(row.dealer_net)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn upsert_momentum(pool: &SqlitePool, rows: &[MomentumSnapshot]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO momentum_metrics
                (ticker, date, rsi14, ma5, ma20, ma60, macd, bollinger_upper, bollinger_mid,
                 bollinger_lower, price_change_1m, return_52w, ma20_above_ma60_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(ticker, date) DO UPDATE SET
                rsi14 = excluded.rsi14, ma5 = excluded.ma5, ma20 = excluded.ma20,
                ma60 = excluded.ma60, macd = excluded.macd,
                bollinger_upper = excluded.bollinger_upper, bollinger_mid = excluded.bollinger_mid,
                bollinger_lower = excluded.bollinger_lower, price_change_1m = excluded.price_change_1m,
                return_52w = excluded.return_52w, ma20_above_ma60_days = excluded.ma20_above_ma60_days",
        )
        .bind(&row.ticker)
        .bind(row.date)
        .bind(row.rsi14)
        .bind(row.ma5)
        .bind(row.ma20)
        .bind(row.ma60)
        .bind(row.macd)
        .bind(row.bollinger_upper)
        .bind(row.bollinger_mid)
        .bind(row.bollinger_lower)
        .bind(row.price_change_1m)
        .bind(row.return_52w)
        .bind(row.ma20_above_ma60_days)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn upsert_stock_list(pool: &SqlitePool, rows: &[StockListing]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            "INSERT INTO stock_list (ticker, name, industry, market)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(ticker) DO UPDATE SET
                name = excluded.name, industry = excluded.industry, market = excluded.market",
        )
        .bind(&row.ticker)
        .bind(&row.name)
        .bind(&row.industry)
        .bind(row.market.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn list_stocks(pool: &SqlitePool) -> Result<Vec<StockListing>> {
    let rows: Vec<(String, String, Option<String>, String)> =
        sqlx::query_as("SELECT ticker, name, industry, market FROM stock_list ORDER BY ticker")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(ticker, name, industry, market)| {
            Market::from_str(&market).map(|market| StockListing {
                ticker,
                name,
                industry,
                market,
            })
        })
        .collect())
}

pub async fn valuation_latest(pool: &SqlitePool, ticker: &str) -> Result<Option<Valuation>> {
    let row: Option<Valuation> = sqlx::query_as(
        "SELECT ticker, date, per, pbr, dividend_yield FROM valuation
         WHERE ticker = ?1 ORDER BY date DESC LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn valuation_range(pool: &SqlitePool, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Valuation>> {
    sqlx::query_as(
        "SELECT ticker, date, per, pbr, dividend_yield FROM valuation
         WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn valuation_cross_section(pool: &SqlitePool, as_of: NaiveDate) -> Result<Vec<Valuation>> {
    sqlx::query_as(
        "SELECT v.ticker, v.date, v.per, v.pbr, v.dividend_yield FROM valuation v
         INNER JOIN (
            SELECT ticker, MAX(date) AS date FROM valuation WHERE date <= ?1 GROUP BY ticker
         ) latest ON v.ticker = latest.ticker AND v.date = latest.date",
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn growth_range(
    pool: &SqlitePool,
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MonthlyRevenue>> {
    sqlx::query_as(
        "SELECT ticker, month, revenue, yoy, mom, eps, eps_qoq FROM growth_metrics
         WHERE ticker = ?1 AND month BETWEEN ?2 AND ?3 ORDER BY month",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn growth_cross_section(pool: &SqlitePool, as_of_month: NaiveDate) -> Result<Vec<MonthlyRevenue>> {
    sqlx::query_as(
        "SELECT g.ticker, g.month, g.revenue, g.yoy, g.mom, g.eps, g.eps_qoq FROM growth_metrics g
         INNER JOIN (
            SELECT ticker, MAX(month) AS month FROM growth_metrics WHERE month <= ?1 GROUP BY ticker
         ) latest ON g.ticker = latest.ticker AND g.month = latest.month",
    )
    .bind(as_of_month)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn fund_flow_range(
    pool: &SqlitePool,
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<FundFlow>> {
    sqlx::query_as(
        "SELECT ticker, date, foreign_net, inv_trust_net, dealer_net FROM fund_flow_metrics
         WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn fund_flow_cross_section(pool: &SqlitePool, as_of: NaiveDate, lookback_days: i64) -> Result<Vec<FundFlow>> {
    let from = as_of - chrono::Duration::days(lookback_days);
    sqlx::query_as(
        "SELECT ticker, date, foreign_net, inv_trust_net, dealer_net FROM fund_flow_metrics
         WHERE date BETWEEN ?1 AND ?2",
    )
    .bind(from)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn momentum_latest(pool: &SqlitePool, ticker: &str) -> Result<Option<MomentumSnapshot>> {
    sqlx::query_as(
        "SELECT ticker, date, rsi14, ma5, ma20, ma60, macd, bollinger_upper, bollinger_mid,
                bollinger_lower, price_change_1m, return_52w, ma20_above_ma60_days
         FROM momentum_metrics WHERE ticker = ?1 ORDER BY date DESC LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn momentum_range(pool: &SqlitePool, ticker: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<MomentumSnapshot>> {
    sqlx::query_as(
        "SELECT ticker, date, rsi14, ma5, ma20, ma60, macd, bollinger_upper, bollinger_mid,
                bollinger_lower, price_change_1m, return_52w, ma20_above_ma60_days
         FROM momentum_metrics WHERE ticker = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
    )
    .bind(ticker)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn momentum_cross_section(pool: &SqlitePool, as_of: NaiveDate) -> Result<Vec<MomentumSnapshot>> {
    sqlx::query_as(
        "SELECT m.ticker, m.date, m.rsi14, m.ma5, m.ma20, m.ma60, m.macd, m.bollinger_upper,
                m.bollinger_mid, m.bollinger_lower, m.price_change_1m, m.return_52w,
                m.ma20_above_ma60_days
         FROM momentum_metrics m
         INNER JOIN (
            SELECT ticker, MAX(date) AS date FROM momentum_metrics WHERE date <= ?1 GROUP BY ticker
         ) latest ON m.ticker = latest.ticker AND m.date = latest.date",
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::{apply_migrations, FUNDAMENTALS_MIGRATIONS};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_migrations(&pool, FUNDAMENTALS_MIGRATIONS).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upsert_valuation_is_idempotent() {
        let pool = memory_pool().await;
        let row = Valuation {
            ticker: "2330".into(),
            date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            per: Some(18.2),
            pbr: Some(5.1),
            dividend_yield: Some(2.3),
        };
        upsert_valuations(&pool, &[row.clone()]).await.unwrap();
        let mut updated = row.clone();
        updated.per = Some(19.0);
        upsert_valuations(&pool, &[updated]).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM valuation")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        let latest = valuation_latest(&pool, "2330").await.unwrap().unwrap();
        assert_eq!(latest.per, Some(19.0));
    }

    #[tokio::test]
    async fn cross_section_picks_most_recent_row_per_ticker() {
        let pool = memory_pool().await;
        let rows = vec![
            Valuation {
                ticker: "2330".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
                per: Some(18.0),
                pbr: None,
                dividend_yield: None,
            },
            Valuation {
                ticker: "2330".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
                per: Some(18.5),
                pbr: None,
                dividend_yield: None,
            },
            Valuation {
                ticker: "2454".into(),
                date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                per: Some(12.0),
                pbr: None,
                dividend_yield: None,
            },
        ];
        upsert_valuations(&pool, &rows).await.unwrap();

        let section = valuation_cross_section(&pool, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap())
            .await
            .unwrap();
        assert_eq!(section.len(), 2);
        let tsmc = section.iter().find(|v| v.ticker == "2330").unwrap();
        assert_eq!(tsmc.per, Some(18.5));
    }
}
