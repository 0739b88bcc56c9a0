//! Price fetcher (spec §4.4 "Price"): dual-source monthly iteration,
//! per-day `INSERT OR REPLACE` into `price.stock_prices`.

use chrono::{Datelike, NaiveDate};

use crate::adapters::primary::PrimarySource;
use crate::adapters::Window;
use crate::error::Result;
use crate::fetchers::FetchContext;
use crate::storage::{price as price_storage, Storage};

pub async fn fetch(ctx: &FetchContext, storage: &Storage, ticker: &str, window: Window, force: bool, today: NaiveDate) -> Result<()> {
    for month in PrimarySource::months_in_window(window, today) {
        fetch_month(ctx, storage, ticker, month, force).await?;
    }
    Ok(())
}

async fn fetch_month(ctx: &FetchContext, storage: &Storage, ticker: &str, month: NaiveDate, force: bool) -> Result<()> {
    let month_end = last_day_of_month(month);

    if !force {
        let existing = price_storage::range(&storage.price, ticker, month, month_end).await?;
        if !existing.is_empty() {
            return Ok(());
        }
    }

    match ctx.primary.fetch_price_month(ticker, month).await {
        Ok(rows) if !rows.0.is_empty() => {
            price_storage::upsert_prices(&storage.price, &rows.0).await?;
            return Ok(());
        }
        _ => {}
    }

    match ctx.fallback.fetch_price(ticker, month, month_end).await {
        Ok(rows) => {
            if !rows.0.is_empty() {
                price_storage::upsert_prices(&storage.price, &rows.0).await?;
            }
            Ok(())
        }
        Err(err) if err.is_quota_exceeded() => Err(err),
        Err(_) => Ok(()),
    }
}

fn last_day_of_month(month: NaiveDate) -> NaiveDate {
    let next_month = if month.month() == 12 {
        NaiveDate::from_ymd_opt(month.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1).unwrap()
    };
    next_month.pred_opt().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_day_of_month_handles_december() {
        let dec = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(last_day_of_month(dec), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(last_day_of_month(feb), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
