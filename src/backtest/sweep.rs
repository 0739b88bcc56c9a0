//! Grid sweep and walk-forward orchestration (C10, spec §4.9). Both wrap
//! [`super::kernel::run`] and never touch I/O themselves.

use std::collections::HashMap;

use chrono::{Months, NaiveDate};

use crate::backtest::kernel::{self, BacktestOptions};
use crate::costmodel::CostModel;
use crate::error::Result;
use crate::models::PriceBar;
use crate::portfolio::{Mode, RankedTicker};

#[derive(Debug, Clone, Copy)]
pub struct GridPoint {
    pub top: usize,
    pub rebalance: usize,
    pub cagr: f64,
    pub mdd: f64,
}

/// Cartesian product over `tops x rebalances`; one [`kernel::run`] per pair.
pub fn grid_sweep(
    ranks: &HashMap<NaiveDate, Vec<RankedTicker>>,
    prices: &HashMap<String, Vec<PriceBar>>,
    tops: &[usize],
    rebalances: &[usize],
    start: NaiveDate,
    end: Option<NaiveDate>,
    mode: Mode,
    cost_model: CostModel,
) -> Result<Vec<GridPoint>> {
    let mut rows = Vec::with_capacity(tops.len() * rebalances.len());
    for &top in tops {
        for &rebalance in rebalances {
            let options = BacktestOptions { start, end, rebalance, top, mode, cost_model };
            let result = kernel::run(ranks, prices, &options)?;
            rows.push(GridPoint { top, rebalance, cagr: result.cagr, mdd: result.mdd });
        }
    }
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct WalkForwardWindow {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub result: super::BacktestResult,
}

/// Rolling `window_years`-long windows stepped by `step_months` across
/// `[start, end]`. Each window is run independently; a window is only
/// emitted if it fits entirely within `[start, end]` (no partial trailing
/// window).
pub fn walk_forward(
    ranks: &HashMap<NaiveDate, Vec<RankedTicker>>,
    prices: &HashMap<String, Vec<PriceBar>>,
    start: NaiveDate,
    end: NaiveDate,
    window_years: u32,
    step_months: u32,
    rebalance: usize,
    top: usize,
    mode: Mode,
    cost_model: CostModel,
) -> Result<Vec<WalkForwardWindow>> {
    let mut windows = Vec::new();
    let mut window_start = start;

    loop {
        let Some(window_end) = window_start.checked_add_months(Months::new(window_years * 12)) else {
            break;
        };
        if window_end > end {
            break;
        }

        let options = BacktestOptions {
            start: window_start,
            end: Some(window_end),
            rebalance,
            top,
            mode,
            cost_model,
        };
        let result = kernel::run(ranks, prices, &options)?;
        windows.push(WalkForwardWindow { window_start, window_end, result });

        let Some(next_start) = window_start.checked_add_months(Months::new(step_months)) else {
            break;
        };
        window_start = next_start;
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ticker: &str, date: NaiveDate, close: f64) -> PriceBar {
        PriceBar { ticker: ticker.into(), date, open: close, high: close, low: close, close, volume: 1, turnover: 1 }
    }

    fn synthetic_prices() -> HashMap<String, Vec<PriceBar>> {
        let mut bars = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut price = 1.0;
        while date < end {
            bars.push(bar("A", date, price));
            price *= 1.0003;
            date = date.succ_opt().unwrap();
        }
        [("A".to_string(), bars)].into_iter().collect()
    }

    fn synthetic_ranks(prices: &HashMap<String, Vec<PriceBar>>) -> HashMap<NaiveDate, Vec<RankedTicker>> {
        prices["A"]
            .iter()
            .map(|b| (b.date, vec![RankedTicker { ticker: "A".to_string(), score: 1.0, market_cap: None }]))
            .collect()
    }

    #[test]
    fn grid_sweep_emits_one_row_per_pair() {
        let prices = synthetic_prices();
        let ranks = synthetic_ranks(&prices);
        let rows = grid_sweep(
            &ranks,
            &prices,
            &[1, 2],
            &[5, 20],
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            Some(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()),
            Mode::Equal,
            CostModel::zero(),
        )
        .unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn walk_forward_covers_the_expected_window_count() {
        let prices = synthetic_prices();
        let ranks = synthetic_ranks(&prices);
        let windows = walk_forward(
            &ranks,
            &prices,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            1,
            6,
            5,
            1,
            Mode::Equal,
            CostModel::zero(),
        )
        .unwrap();
        // windows starting 2020-01, 2020-07, 2021-01, 2021-07, 2022-01 all
        // end <= 2023-01-01 (2022-01's window ends exactly on 2023-01-01).
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].window_start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(windows[0].window_end, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    }
}
