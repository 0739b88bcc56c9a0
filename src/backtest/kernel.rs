//! Back-test kernel (C9, spec §4.8): an event loop over a sorted trading
//! calendar that rebalances to target weights, marks to market, and
//! reports CAGR/Sharpe/MDD. Pure CPU, single-threaded, deterministic given
//! identical inputs (spec §5 "Numeric/analytic code is strictly
//! single-threaded and deterministic").

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::costmodel::{CostModel, Side};
use crate::error::{AppError, Result};
use crate::models::PriceBar;
use crate::portfolio::{self, Mode, PortfolioOptions, RankedTicker};

const EPSILON_UNITS: f64 = 1e-8;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone)]
pub struct BacktestOptions {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub rebalance: usize,
    pub top: usize,
    pub mode: Mode,
    pub cost_model: CostModel,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub equity: Vec<f64>,
    pub returns: Vec<f64>,
    pub cagr: f64,
    pub sharpe: f64,
    pub mdd: f64,
}

/// `ranks[date]` is the cross-section of scored tickers available for a
/// rebalance decision on `date`; a date with no entry simply skips
/// rebalancing that day. `prices[ticker]` must be sorted ascending by
/// date; validated for `close > 0, finite` before the run starts.
pub fn run(
    ranks: &HashMap<NaiveDate, Vec<RankedTicker>>,
    prices: &HashMap<String, Vec<PriceBar>>,
    options: &BacktestOptions,
) -> Result<BacktestResult> {
    validate_prices(prices)?;

    let end = options.end.unwrap_or(NaiveDate::MAX);
    let mut calendar: Vec<NaiveDate> = prices
        .values()
        .flat_map(|bars| bars.iter().map(|b| b.date))
        .filter(|d| *d >= options.start && *d <= end)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    calendar.sort();
    if calendar.is_empty() {
        return Err(AppError::InvalidPriceData(
            "no trading dates in [start, end] intersect the price data".to_string(),
        ));
    }

    let bars_by_ticker_date: HashMap<(&str, NaiveDate), &PriceBar> = prices
        .iter()
        .flat_map(|(ticker, bars)| bars.iter().map(move |b| ((ticker.as_str(), b.date), b)))
        .collect();

    let rebalance_step = options.rebalance.max(1);
    let mut cash = 1.0;
    let mut holdings: HashMap<String, f64> = HashMap::new();
    let mut last_price: HashMap<String, f64> = HashMap::new();
    let mut equity = Vec::with_capacity(calendar.len());

    for (i, date) in calendar.iter().enumerate() {
        for ticker in prices.keys() {
            if let Some(bar) = bars_by_ticker_date.get(&(ticker.as_str(), *date)) {
                last_price.insert(ticker.clone(), bar.close);
            }
        }

        let should_rebalance = i == 0 || i % rebalance_step == 0;
        if should_rebalance {
            if let Some(targets) = ranks.get(date) {
                let weights = portfolio::build_weights(
                    targets,
                    PortfolioOptions { top: options.top, mode: options.mode },
                );
                rebalance(&mut cash, &mut holdings, &last_price, &weights, &options.cost_model);
            }
        }

        let mark = cash + holdings.iter().filter_map(|(s, units)| last_price.get(s).map(|p| units * p)).sum::<f64>();
        equity.push(mark);
    }

    Ok(summarize(calendar, equity))
}

fn validate_prices(prices: &HashMap<String, Vec<PriceBar>>) -> Result<()> {
    for bars in prices.values() {
        for bar in bars {
            if !(bar.close > 0.0 && bar.close.is_finite()) {
                return Err(AppError::InvalidPriceData(format!(
                    "{} on {} has non-positive or non-finite close {}",
                    bar.ticker, bar.date, bar.close
                )));
            }
        }
    }
    Ok(())
}

fn rebalance(
    cash: &mut f64,
    holdings: &mut HashMap<String, f64>,
    last_price: &HashMap<String, f64>,
    targets: &HashMap<String, f64>,
    cost_model: &CostModel,
) {
    let value = *cash
        + holdings
            .iter()
            .filter_map(|(s, units)| last_price.get(s).map(|p| units * p))
            .sum::<f64>();

    let held: Vec<String> = holdings.keys().cloned().collect();
    for ticker in held {
        if !targets.contains_key(&ticker) {
            if let Some(price) = last_price.get(&ticker) {
                let units = holdings.remove(&ticker).unwrap_or(0.0);
                *cash += cost_model.apply(*price, Side::Sell) * units;
            }
        }
    }

    for (ticker, weight) in targets {
        let Some(price) = last_price.get(ticker) else {
            continue; // no price for this target on this rebalance: skip for this rebalance only
        };
        if *price <= 0.0 {
            continue;
        }
        let target_units = value * weight / price;
        let current_units = holdings.get(ticker).copied().unwrap_or(0.0);
        let diff = target_units - current_units;
        if diff.abs() < EPSILON_UNITS {
            continue;
        }
        if diff > 0.0 {
            *cash -= cost_model.apply(*price, Side::Buy) * diff;
        } else {
            *cash += cost_model.apply(*price, Side::Sell) * (-diff);
        }
        *holdings.entry(ticker.clone()).or_insert(0.0) += diff;
    }
}

fn summarize(dates: Vec<NaiveDate>, equity: Vec<f64>) -> BacktestResult {
    let returns: Vec<f64> = equity.windows(2).map(|w| w[1] / w[0] - 1.0).collect();

    let n = equity.len().saturating_sub(1);
    let cagr = if n == 0 || equity[0] <= 0.0 {
        0.0
    } else {
        (equity[equity.len() - 1] / equity[0]).powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0
    };

    let sharpe = if returns.is_empty() {
        0.0
    } else {
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        let stdev = variance.sqrt();
        if stdev == 0.0 { 0.0 } else { (mean / stdev) * TRADING_DAYS_PER_YEAR.sqrt() }
    };

    let mdd = max_drawdown(&equity);

    BacktestResult { dates, equity, returns, cagr, sharpe, mdd }
}

/// `min_i(equity[i] / running_peak(0..=i) - 1)`, reported non-positive.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in equity {
        peak = peak.max(value);
        let drawdown = value / peak - 1.0;
        worst = worst.min(drawdown);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ticker: &str, date: NaiveDate, close: f64) -> PriceBar {
        PriceBar { ticker: ticker.into(), date, open: close, high: close, low: close, close, volume: 1, turnover: 1 }
    }

    #[test]
    fn zero_cost_constant_price_preserves_equity() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let prices: HashMap<String, Vec<PriceBar>> = [("A".to_string(), vec![bar("A", d1, 1.0), bar("A", d2, 1.0)])].into_iter().collect();
        let ranks: HashMap<NaiveDate, Vec<RankedTicker>> =
            [(d1, vec![RankedTicker { ticker: "A".to_string(), score: 1.0, market_cap: None }])].into_iter().collect();

        let options = BacktestOptions {
            start: d1,
            end: Some(d2),
            rebalance: 1,
            top: 1,
            mode: Mode::Equal,
            cost_model: CostModel::zero(),
        };
        let result = run(&ranks, &prices, &options).unwrap();
        assert!((result.equity.last().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_costs_erode_equity_on_entry() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let prices: HashMap<String, Vec<PriceBar>> = [("A".to_string(), vec![bar("A", d1, 1.0), bar("A", d2, 1.0)])].into_iter().collect();
        let ranks: HashMap<NaiveDate, Vec<RankedTicker>> =
            [(d1, vec![RankedTicker { ticker: "A".to_string(), score: 1.0, market_cap: None }])].into_iter().collect();

        let options = BacktestOptions {
            start: d1,
            end: Some(d2),
            rebalance: 1,
            top: 1,
            mode: Mode::Equal,
            cost_model: CostModel::default(),
        };
        let result = run(&ranks, &prices, &options).unwrap();
        assert!(*result.equity.last().unwrap() < 1.0);
    }

    #[test]
    fn liquidates_fully_when_no_target_weights_on_a_later_date() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let prices: HashMap<String, Vec<PriceBar>> =
            [("A".to_string(), vec![bar("A", d1, 1.0), bar("A", d2, 1.0), bar("A", d3, 1.0)])].into_iter().collect();
        // Day 2 has an empty (but present) target map -> liquidates.
        let ranks: HashMap<NaiveDate, Vec<RankedTicker>> = [
            (d1, vec![RankedTicker { ticker: "A".to_string(), score: 1.0, market_cap: None }]),
            (d2, vec![]),
        ]
        .into_iter()
        .collect();

        let options = BacktestOptions {
            start: d1,
            end: Some(d3),
            rebalance: 1,
            top: 1,
            mode: Mode::Equal,
            cost_model: CostModel::zero(),
        };
        let result = run(&ranks, &prices, &options).unwrap();
        assert_eq!(result.equity.len(), 3);
    }

    #[test]
    fn rejects_non_positive_close() {
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let prices: HashMap<String, Vec<PriceBar>> = [("A".to_string(), vec![bar("A", d1, 0.0)])].into_iter().collect();
        let ranks = HashMap::new();
        let options = BacktestOptions {
            start: d1,
            end: Some(d1),
            rebalance: 1,
            top: 1,
            mode: Mode::Equal,
            cost_model: CostModel::zero(),
        };
        let err = run(&ranks, &prices, &options).unwrap_err();
        assert!(matches!(err, AppError::InvalidPriceData(_)));
    }

    #[test]
    fn max_drawdown_is_nonpositive() {
        let equity = vec![1.0, 1.2, 0.9, 1.1];
        let mdd = max_drawdown(&equity);
        assert!(mdd <= 0.0);
        assert!((mdd - (0.9 / 1.2 - 1.0)).abs() < 1e-9);
    }
}
