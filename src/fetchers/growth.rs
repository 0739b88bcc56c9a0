//! Growth fetcher (spec §4.4 "Growth"): iterates months in the window,
//! converts ROC dates at the adapter boundary, and derives YoY/MoM over
//! the resulting revenue sequence regardless of source. Fallback-supplied
//! YoY, when present, is trusted and copied verbatim rather than
//! recomputed.

use chrono::{Datelike, NaiveDate};

use crate::adapters::primary::PrimarySource;
use crate::adapters::Window;
use crate::error::Result;
use crate::fetchers::FetchContext;
use crate::models::MonthlyRevenue;
use crate::storage::{fundamentals, Storage};

pub async fn fetch(ctx: &FetchContext, storage: &Storage, ticker: &str, window: Window, force: bool, today: NaiveDate) -> Result<()> {
    for month in PrimarySource::months_in_window(window, today) {
        fetch_month(ctx, storage, ticker, month, force).await?;
    }
    Ok(())
}

async fn fetch_month(ctx: &FetchContext, storage: &Storage, ticker: &str, month: NaiveDate, force: bool) -> Result<()> {
    if !force {
        let existing = fundamentals::growth_range(&storage.fundamentals, ticker, month, month).await?;
        if !existing.is_empty() {
            return Ok(());
        }
    }

    let mut row = match ctx.primary.fetch_revenue_month(ticker, month).await {
        Ok(rows) if !rows.0.is_empty() => rows.0.into_iter().next(),
        _ => None,
    };

    if row.is_none() {
        let month_end = last_day_of_month(month);
        row = match ctx.fallback.fetch_monthly_revenue(ticker, month, month_end).await {
            Ok(rows) => rows.0.into_iter().next(),
            Err(err) if err.is_quota_exceeded() => return Err(err),
            Err(_) => None,
        };
    }

    let Some(mut row) = row else {
        return Ok(());
    };
    row.ticker = ticker.to_string();
    row.month = month;

    fill_derived_growth(storage, ticker, &mut row).await?;
    fundamentals::upsert_growth(&storage.fundamentals, &[row]).await?;
    Ok(())
}

/// Computes YoY/MoM from stored history when the upstream row did not
/// already carry a trusted value (spec §3: `YoY = 100·(r_t − r_{t−12})/r_{t−12}`
/// when prior revenue > 0, else null; MoM analogous with t−1).
async fn fill_derived_growth(storage: &Storage, ticker: &str, row: &mut MonthlyRevenue) -> Result<()> {
    if row.yoy.is_none() {
        let prior_year = shift_months(row.month, -12);
        if let Some(prior) = single_month(storage, ticker, prior_year).await? {
            if prior.revenue > 0 {
                row.yoy = Some(100.0 * (row.revenue - prior.revenue) as f64 / prior.revenue as f64);
            }
        }
    }
    if row.mom.is_none() {
        let prior_month = shift_months(row.month, -1);
        if let Some(prior) = single_month(storage, ticker, prior_month).await? {
            if prior.revenue > 0 {
                row.mom = Some(100.0 * (row.revenue - prior.revenue) as f64 / prior.revenue as f64);
            }
        }
    }
    Ok(())
}

async fn single_month(storage: &Storage, ticker: &str, month: NaiveDate) -> Result<Option<MonthlyRevenue>> {
    let rows = fundamentals::growth_range(&storage.fundamentals, ticker, month, month).await?;
    Ok(rows.into_iter().next())
}

fn shift_months(date: NaiveDate, delta: i32) -> NaiveDate {
    let total_months = date.year() * 12 + date.month() as i32 - 1 + delta;
    let year = total_months.div_euclid(12);
    let month = total_months.rem_euclid(12) + 1;
    NaiveDate::from_ymd_opt(year, month as u32, 1).unwrap()
}

fn last_day_of_month(month: NaiveDate) -> NaiveDate {
    let next_month = if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1).unwrap()
    };
    next_month.pred_opt().unwrap()
}
