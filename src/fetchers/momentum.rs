//! Momentum fetcher (spec §4.4 "Momentum"): extends the requested window
//! backwards by 120 days so MA60/RSI(14) have warm-up, ensures the
//! underlying close-price series is in storage (delegating to the Price
//! fetcher), then derives the latest technical-indicator snapshot.

use chrono::NaiveDate;

use crate::adapters::Window;
use crate::error::Result;
use crate::fetchers::{price, FetchContext};
use crate::indicators;
use crate::models::MomentumSnapshot;
use crate::storage::{fundamentals, price as price_storage, Storage};

const WARMUP_DAYS: i64 = 120;
const ONE_MONTH_OFFSET: usize = 22;
const ONE_YEAR_OFFSET: usize = 252;

pub async fn fetch(
    ctx: &FetchContext,
    storage: &Storage,
    ticker: &str,
    window: Window,
    force: bool,
    today: NaiveDate,
) -> Result<()> {
    if !force {
        if let Some(existing) = fundamentals::momentum_latest(&storage.fundamentals, ticker).await? {
            if existing.date >= window.end {
                return Ok(());
            }
        }
    }

    let extended = Window {
        start: window.start - chrono::Duration::days(WARMUP_DAYS),
        end: window.end,
    };
    price::fetch(ctx, storage, ticker, extended, force, today).await?;

    let bars = price_storage::range(&storage.price, ticker, extended.start, extended.end).await?;
    if bars.is_empty() {
        return Ok(());
    }

    let snapshot = compute_snapshot(ticker, &bars);
    fundamentals::upsert_momentum(&storage.fundamentals, &[snapshot]).await?;
    Ok(())
}

/// Computes the last-bar snapshot from an ascending-date bar series. All
/// fields are `None` where warm-up was insufficient (spec §4.4).
fn compute_snapshot(ticker: &str, bars: &[crate::models::PriceBar]) -> MomentumSnapshot {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let last = closes.len() - 1;
    let date = bars[last].date;

    let ma5 = indicators::sma(&closes, 5);
    let ma20 = indicators::sma(&closes, 20);
    let ma60 = indicators::sma(&closes, 60);
    let rsi14 = indicators::rsi(&closes, 14);
    let macd = indicators::macd(&closes, 12, 26);
    let bollinger = indicators::bollinger(&closes, 20, 2.0);

    MomentumSnapshot {
        ticker: ticker.to_string(),
        date,
        rsi14: rsi14[last],
        ma5: ma5[last],
        ma20: ma20[last],
        ma60: ma60[last],
        macd: macd[last],
        bollinger_upper: bollinger.upper[last],
        bollinger_mid: bollinger.mid[last],
        bollinger_lower: bollinger.lower[last],
        price_change_1m: indicators::trailing_return(&closes, ONE_MONTH_OFFSET),
        return_52w: indicators::trailing_return(&closes, ONE_YEAR_OFFSET),
        ma20_above_ma60_days: indicators::count_ma20_above_ma60(&ma20, &ma60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bar(ticker: &str, date: NaiveDate, close: f64) -> crate::models::PriceBar {
        crate::models::PriceBar {
            ticker: ticker.into(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
            turnover: 1000,
        }
    }

    #[test]
    fn snapshot_emits_only_last_bar_values() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let bars: Vec<_> = (0..70)
            .map(|i| bar("2330", start + Duration::days(i), 100.0 + i as f64))
            .collect();
        let snapshot = compute_snapshot("2330", &bars);
        assert_eq!(snapshot.date, bars.last().unwrap().date);
        assert!(snapshot.ma60.is_some());
        assert!(snapshot.rsi14.is_some());
    }

    #[test]
    fn snapshot_is_none_without_enough_warmup() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let bars: Vec<_> = (0..10)
            .map(|i| bar("2330", start + Duration::days(i), 100.0 + i as f64))
            .collect();
        let snapshot = compute_snapshot("2330", &bars);
        assert_eq!(snapshot.ma60, None);
        assert_eq!(snapshot.rsi14, None);
    }
}
