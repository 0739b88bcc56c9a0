//! End-to-end seed test across storage, scoring, portfolio, and the
//! back-test kernel: two tickers with distinct fundamentals are scored,
//! ranked, and run through a short back-test.

use std::collections::HashMap;

use chrono::NaiveDate;

use tw_equity_screener::backtest::{self, BacktestOptions};
use tw_equity_screener::config::Config;
use tw_equity_screener::costmodel::CostModel;
use tw_equity_screener::models::{FundFlow, MomentumSnapshot, MonthlyRevenue, PriceBar, Quality, Valuation};
use tw_equity_screener::portfolio::{self, Mode, PortfolioOptions, RankedTicker};
use tw_equity_screener::scoring::{self, Method, ScoringConfig};
use tw_equity_screener::storage::{fundamentals, price as price_storage, quality as quality_storage, Storage};

async fn test_config(dir: &std::path::Path) -> Config {
    Config {
        finmind_token: None,
        db_path: dir.to_string_lossy().to_string(),
        cache_dir: dir.to_string_lossy().to_string(),
        progress_dir: dir.to_string_lossy().to_string(),
        fetch_concurrency: 1,
        http_timeout_secs: 5,
    }
}

fn bar(ticker: &str, date: NaiveDate, close: f64) -> PriceBar {
    PriceBar { ticker: ticker.into(), date, open: close, high: close, low: close, close, volume: 1_000_000, turnover: 1_000_000 }
}

/// Seeds "STRONG" with better valuation/growth/quality/chips/momentum
/// inputs than "WEAK" on the same date, across all three databases.
async fn seed_two_tickers(storage: &Storage, as_of: NaiveDate) {
    fundamentals::upsert_valuations(
        &storage.fundamentals,
        &[
            Valuation { ticker: "STRONG".into(), date: as_of, per: Some(8.0), pbr: Some(1.0), dividend_yield: Some(5.0) },
            Valuation { ticker: "WEAK".into(), date: as_of, per: Some(40.0), pbr: Some(6.0), dividend_yield: Some(0.1) },
        ],
    )
    .await
    .unwrap();

    let month = NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1).unwrap();
    use chrono::Datelike;
    fundamentals::upsert_growth(
        &storage.fundamentals,
        &[
            MonthlyRevenue { ticker: "STRONG".into(), month, revenue: 1_000_000, yoy: Some(30.0), mom: Some(5.0), eps: Some(2.0), eps_qoq: Some(10.0) },
            MonthlyRevenue { ticker: "WEAK".into(), month, revenue: 500_000, yoy: Some(-10.0), mom: Some(-2.0), eps: Some(0.1), eps_qoq: Some(-5.0) },
        ],
    )
    .await
    .unwrap();

    quality_storage::upsert_quality(
        &storage.quality,
        &[
            Quality { ticker: "STRONG".into(), date: as_of, roe: Some(25.0), gross_margin: Some(55.0), op_margin: Some(30.0), ..Default::default() },
            Quality { ticker: "WEAK".into(), date: as_of, roe: Some(2.0), gross_margin: Some(10.0), op_margin: Some(1.0), ..Default::default() },
        ],
    )
    .await
    .unwrap();

    fundamentals::upsert_fund_flow(
        &storage.fundamentals,
        &[
            FundFlow { ticker: "STRONG".into(), date: as_of, foreign_net: 5_000_000, inv_trust_net: 1_000_000, dealer_net: 200_000 },
            FundFlow { ticker: "WEAK".into(), date: as_of, foreign_net: -3_000_000, inv_trust_net: -500_000, dealer_net: -100_000 },
        ],
    )
    .await
    .unwrap();

    fundamentals::upsert_momentum(
        &storage.fundamentals,
        &[
            MomentumSnapshot { ticker: "STRONG".into(), date: as_of, rsi14: Some(70.0), price_change_1m: Some(12.0), ..Default::default() },
            MomentumSnapshot { ticker: "WEAK".into(), date: as_of, rsi14: Some(25.0), price_change_1m: Some(-8.0), ..Default::default() },
        ],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn stronger_fundamentals_rank_above_weaker_ones() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    let storage = Storage::open(&config).await.unwrap();
    let as_of = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    seed_two_tickers(&storage, as_of).await;

    let config_scoring = ScoringConfig { method: Method::Percentile, ..ScoringConfig::default() };
    let strong = scoring::score_ticker(&storage, "STRONG", as_of, config_scoring).await.unwrap();
    let weak = scoring::score_ticker(&storage, "WEAK", as_of, config_scoring).await.unwrap();

    assert!(strong.total > weak.total, "strong={} weak={}", strong.total, weak.total);
    assert!(strong.missing.is_empty());
    assert!(weak.missing.is_empty());

    let ranks = vec![
        RankedTicker { ticker: strong.ticker.clone(), score: strong.total, market_cap: None },
        RankedTicker { ticker: weak.ticker.clone(), score: weak.total, market_cap: None },
    ];
    let weights = portfolio::build_weights(&ranks, PortfolioOptions { top: 1, mode: Mode::Equal });
    assert_eq!(weights.len(), 1);
    assert!(weights.contains_key("STRONG"));

    storage.close().await;
}

#[tokio::test]
async fn backtest_over_seeded_prices_matches_cost_model_direction() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).await;
    let storage = Storage::open(&config).await.unwrap();

    let d1 = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    let d3 = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
    price_storage::upsert_prices(
        &storage.price,
        &[bar("2330", d1, 100.0), bar("2330", d2, 101.0), bar("2330", d3, 102.0)],
    )
    .await
    .unwrap();

    let prices: HashMap<String, Vec<PriceBar>> = [("2330".to_string(), price_storage::range(&storage.price, "2330", d1, d3).await.unwrap())]
        .into_iter()
        .collect();
    let ranks: HashMap<NaiveDate, Vec<RankedTicker>> =
        [(d1, vec![RankedTicker { ticker: "2330".to_string(), score: 1.0, market_cap: None }])].into_iter().collect();

    let zero_cost = BacktestOptions { start: d1, end: Some(d3), rebalance: 1, top: 1, mode: Mode::Equal, cost_model: CostModel::zero() };
    let zero_result = backtest::run(&ranks, &prices, &zero_cost).unwrap();
    assert!(zero_result.equity.last().unwrap() > &1.0);

    let real_cost = BacktestOptions { cost_model: CostModel::default(), ..zero_cost };
    let real_result = backtest::run(&ranks, &prices, &real_cost).unwrap();
    assert!(real_result.equity.last().unwrap() < zero_result.equity.last().unwrap());

    storage.close().await;
}
