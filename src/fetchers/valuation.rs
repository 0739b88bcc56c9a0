//! Valuation fetcher (spec §4.4 "Valuation"). Primary gives PER/PBR/
//! DividendYield for the latest trading day only; Fallback gives a daily
//! series over the window. Writes land in `fundamentals.valuation`
//! (canonical, read by scoring) and are mirrored into `price.valuations`
//! (legacy, written by the `fetch-price --type=valuation` CLI path).

use crate::adapters::Window;
use crate::error::Result;
use crate::fetchers::FetchContext;
use crate::storage::{fundamentals, price as price_storage, Storage};

pub async fn fetch(ctx: &FetchContext, storage: &Storage, ticker: &str, window: Window, force: bool) -> Result<()> {
    if !force {
        if let Some(existing) = fundamentals::valuation_latest(&storage.fundamentals, ticker).await? {
            if existing.date >= window.end {
                return Ok(());
            }
        }
    }

    match ctx.primary.fetch_valuation_latest(ticker, window.end).await {
        Ok(rows) if !rows.0.is_empty() => {
            return write(storage, &rows.0).await;
        }
        _ => {}
    }

    match ctx.fallback.fetch_valuation(ticker, window.start, window.end).await {
        Ok(rows) => {
            if !rows.0.is_empty() {
                write(storage, &rows.0).await?;
            }
            Ok(())
        }
        Err(err) if err.is_quota_exceeded() => Err(err),
        Err(_) => Ok(()),
    }
}

async fn write(storage: &Storage, rows: &[crate::models::Valuation]) -> Result<()> {
    fundamentals::upsert_valuations(&storage.fundamentals, rows).await?;
    price_storage::upsert_valuations(&storage.price, rows).await?;
    Ok(())
}
