//! CLI entry point (spec §6): one `clap`-derived binary, one subcommand per
//! verb, exit 0 on success and 1 on error after logging — the teacher's
//! single-binary-with-subcommands shape rather than its per-script bins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use tw_equity_screener::adapters::Window;
use tw_equity_screener::backtest::{self, sweep, BacktestOptions};
use tw_equity_screener::bootstrap;
use tw_equity_screener::config::{parse_date, Config};
use tw_equity_screener::executor::{self, signals::CleanupRegistry, ExecutorOptions};
use tw_equity_screener::fetchers::{fund_flow, growth, momentum, price, quality, valuation, FetchContext};
use tw_equity_screener::logging;
use tw_equity_screener::models::{Market, ScoredRank};
use tw_equity_screener::portfolio::{Mode, RankedTicker};
use tw_equity_screener::scoring::{self, Method, ScoringConfig, Weights};
use tw_equity_screener::storage::{price as price_storage, Storage};
use tw_equity_screener::universe;

#[derive(Parser)]
#[command(name = "tw-screener", about = "Taiwan equity screening and back-test engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    FetchPrice {
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long, default_value_t = 365)]
        days: i64,
        #[arg(long, default_value = "both")]
        r#type: String,
    },
    FetchGrowth {
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
    FetchQuality {
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
    FetchFundFlow {
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
    FetchMomentum {
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
    UpdateStockList {
        #[arg(long)]
        force: bool,
    },
    Update {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        factors: Option<String>,
        #[arg(long)]
        stocks: Option<String>,
        #[arg(long)]
        clean: bool,
        #[arg(long)]
        status: bool,
    },
    Rank {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        weights: Option<String>,
        #[arg(long, default_value = "zscore")]
        method: String,
    },
    Explain {
        ticker: String,
    },
    ListStocks {
        #[arg(long)]
        market: Option<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        show_scores: bool,
        #[arg(long)]
        export: Option<String>,
    },
    Backtest {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 20)]
        rebalance: usize,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value = "equal")]
        mode: String,
    },
    Optimize {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "20")]
        rebalance: String,
        #[arg(long, default_value = "10")]
        top: String,
        #[arg(long, default_value = "equal")]
        mode: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    WalkForward {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = 20)]
        rebalance: usize,
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value_t = 3)]
        window: u32,
        #[arg(long, default_value_t = 6)]
        step: u32,
        #[arg(long)]
        out: PathBuf,
    },
    BootstrapPnl {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let _logging_guard = logging::init_logging();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "command failed");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = Arc::new(Storage::open(&config).await?);

    let cleanup = CleanupRegistry::new();
    let cleanup_storage = storage.clone();
    cleanup
        .register(Box::new(move || {
            info!("flushing storage handles on shutdown");
            drop(cleanup_storage);
        }))
        .await;
    cleanup.install();

    let today = chrono::Utc::now().date_naive();

    match cli.command {
        Command::FetchPrice { stocks, days, r#type } => {
            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(days), end: today };
            if r#type == "price" || r#type == "both" {
                run_fetch(&config, &ctx, &storage, "fetch-price", tickers.clone(), move |ctx, storage, ticker| {
                    async move { price::fetch(&ctx, &storage, &ticker, window, false, today).await }
                })
                .await?;
            }
            if r#type == "valuation" || r#type == "both" {
                run_fetch(&config, &ctx, &storage, "fetch-valuation", tickers, move |ctx, storage, ticker| {
                    async move { valuation::fetch(&ctx, &storage, &ticker, window, false).await }
                })
                .await?;
            }
        }
        Command::FetchGrowth { stocks, days } => {
            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(days), end: today };
            run_fetch(&config, &ctx, &storage, "fetch-growth", tickers, move |ctx, storage, ticker| {
                async move { growth::fetch(&ctx, &storage, &ticker, window, false, today).await }
            })
            .await?;
        }
        Command::FetchQuality { stocks, days } => {
            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(days), end: today };
            run_fetch(&config, &ctx, &storage, "fetch-quality", tickers, move |ctx, storage, ticker| {
                async move { quality::fetch(&ctx, &storage, &ticker, window, false, today).await }
            })
            .await?;
        }
        Command::FetchFundFlow { stocks, days } => {
            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(days), end: today };
            run_fetch(&config, &ctx, &storage, "fetch-fund-flow", tickers, move |ctx, storage, ticker| {
                async move { fund_flow::fetch(&ctx, &storage, &ticker, window, false, today).await }
            })
            .await?;
        }
        Command::FetchMomentum { stocks, days } => {
            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(days), end: today };
            run_fetch(&config, &ctx, &storage, "fetch-momentum", tickers, move |ctx, storage, ticker| {
                async move { momentum::fetch(&ctx, &storage, &ticker, window, false, today).await }
            })
            .await?;
        }
        Command::UpdateStockList { force } => {
            let ctx = FetchContext::new(&config);
            if force || universe::should_update(&storage).await? {
                let count = universe::refresh(&storage, &ctx.primary).await?;
                info!(count, "universe catalog refreshed");
            } else {
                info!("universe catalog is fresh, skipping refresh");
            }
        }
        Command::Update { force, factors, stocks, clean, status } => {
            if status {
                print_update_status(&config).await?;
                return Ok(());
            }

            let ctx = Arc::new(FetchContext::new(&config));
            let tickers = resolve_tickers(&storage, stocks).await?;
            let window = Window { start: today - chrono::Duration::days(365), end: today };
            let selected = factors
                .map(|f| f.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>())
                .unwrap_or_else(|| vec!["price".into(), "growth".into(), "quality".into(), "fund-flow".into(), "momentum".into()]);

            if clean {
                for name in &selected {
                    let ledger_path = config.progress_ledger_path(name);
                    std::fs::remove_file(&ledger_path).ok();
                }
            }

            for name in &selected {
                let ctx = ctx.clone();
                let storage = storage.clone();
                match name.as_str() {
                    "price" => run_fetch(&config, &ctx, &storage, "fetch-price", tickers.clone(), move |ctx, storage, ticker| {
                        async move { price::fetch(&ctx, &storage, &ticker, window, force, today).await }
                    })
                    .await?,
                    "growth" => run_fetch(&config, &ctx, &storage, "fetch-growth", tickers.clone(), move |ctx, storage, ticker| {
                        async move { growth::fetch(&ctx, &storage, &ticker, window, force, today).await }
                    })
                    .await?,
                    "quality" => run_fetch(&config, &ctx, &storage, "fetch-quality", tickers.clone(), move |ctx, storage, ticker| {
                        async move { quality::fetch(&ctx, &storage, &ticker, window, force, today).await }
                    })
                    .await?,
                    "fund-flow" => run_fetch(&config, &ctx, &storage, "fetch-fund-flow", tickers.clone(), move |ctx, storage, ticker| {
                        async move { fund_flow::fetch(&ctx, &storage, &ticker, window, force, today).await }
                    })
                    .await?,
                    "momentum" => run_fetch(&config, &ctx, &storage, "fetch-momentum", tickers.clone(), move |ctx, storage, ticker| {
                        async move { momentum::fetch(&ctx, &storage, &ticker, window, force, today).await }
                    })
                    .await?,
                    other => {
                        return Err(anyhow::anyhow!("unknown factor: {other}"));
                    }
                }
            }
        }
        Command::Rank { limit, min_score, weights, method } => {
            let config_weights = weights.as_deref().map(parse_weights).transpose()?.unwrap_or_default();
            let scoring_config = ScoringConfig { weights: config_weights, method: parse_method(&method)?, window: 3 };
            let tickers = resolve_tickers(&storage, None).await?;
            let mut ranked = score_all(&storage, &tickers, today, scoring_config).await?;
            ranked.retain(|r| min_score.map(|m| r.total >= m).unwrap_or(true));
            ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.ticker.cmp(&b.ticker)));
            ranked.truncate(limit);
            print_ranks(&ranked);
        }
        Command::Explain { ticker } => {
            let scoring_config = ScoringConfig::default();
            let rank = scoring::score_ticker(&storage, &ticker, today, scoring_config).await?;
            println!("{}", serde_json::to_string_pretty(&rank)?);
        }
        Command::ListStocks { market, industry, limit, min_score, show_scores, export } => {
            let mut listings = universe::list(&storage).await?;
            if let Some(market) = market.as_deref().and_then(Market::from_str) {
                listings.retain(|l| l.market == market);
            }
            if let Some(industry) = industry.as_deref() {
                listings.retain(|l| l.industry.as_deref() == Some(industry));
            }
            listings.truncate(limit);

            let scores: HashMap<String, f64> = if show_scores || min_score.is_some() {
                let config = ScoringConfig::default();
                let mut map = HashMap::new();
                for listing in &listings {
                    let rank = scoring::score_ticker(&storage, &listing.ticker, today, config).await?;
                    map.insert(listing.ticker.clone(), rank.total);
                }
                map
            } else {
                HashMap::new()
            };

            if let Some(min) = min_score {
                listings.retain(|l| scores.get(&l.ticker).copied().unwrap_or(0.0) >= min);
            }

            match export.as_deref() {
                Some("csv") => export_stocks_csv(&listings, &scores, show_scores)?,
                Some("json") => export_stocks_json(&listings, &scores, show_scores)?,
                _ => print_stocks(&listings, &scores, show_scores),
            }
        }
        Command::Backtest { start, end, rebalance, top, mode } => {
            let start = parse_date(&start)?;
            let end = end.map(|e| parse_date(&e)).transpose()?;
            let tickers = resolve_tickers(&storage, None).await?;
            let prices = load_price_series(&storage, &tickers, start, end.unwrap_or(today)).await?;
            let ranks = build_ranks(&storage, &prices, ScoringConfig::default()).await?;
            let options = BacktestOptions {
                start,
                end,
                rebalance,
                top,
                mode: parse_mode(&mode)?,
                cost_model: tw_equity_screener::costmodel::CostModel::default(),
            };
            let result = backtest::run(&ranks, &prices, &options)?;
            println!("{}", serde_json::json!({
                "cagr": result.cagr,
                "sharpe": result.sharpe,
                "mdd": result.mdd,
                "final_equity": result.equity.last(),
            }));
        }
        Command::Optimize { start, end, rebalance, top, mode, out } => {
            let start = parse_date(&start)?;
            let end = end.map(|e| parse_date(&e)).transpose()?;
            let rebalances = parse_usize_csv(&rebalance)?;
            let tops = parse_usize_csv(&top)?;
            let mode = parse_mode(&mode)?;
            let tickers = resolve_tickers(&storage, None).await?;
            let prices = load_price_series(&storage, &tickers, start, end.unwrap_or(today)).await?;
            let ranks = build_ranks(&storage, &prices, ScoringConfig::default()).await?;
            let rows = sweep::grid_sweep(
                &ranks,
                &prices,
                &tops,
                &rebalances,
                start,
                end,
                mode,
                tw_equity_screener::costmodel::CostModel::default(),
            )?;
            let json = serde_json::to_string_pretty(
                &rows.iter().map(|r| serde_json::json!({"top": r.top, "rebalance": r.rebalance, "cagr": r.cagr, "mdd": r.mdd})).collect::<Vec<_>>(),
            )?;
            if let Some(out) = out {
                std::fs::write(out, json)?;
            } else {
                println!("{json}");
            }
        }
        Command::WalkForward { start, end, rebalance, top, window, step, out } => {
            let start = parse_date(&start)?;
            let end = parse_date(&end)?;
            let tickers = resolve_tickers(&storage, None).await?;
            let prices = load_price_series(&storage, &tickers, start, end).await?;
            let ranks = build_ranks(&storage, &prices, ScoringConfig::default()).await?;
            let windows = sweep::walk_forward(
                &ranks,
                &prices,
                start,
                end,
                window,
                step,
                rebalance,
                top,
                Mode::Equal,
                tw_equity_screener::costmodel::CostModel::default(),
            )?;
            let json = serde_json::to_string_pretty(
                &windows
                    .iter()
                    .map(|w| {
                        serde_json::json!({
                            "window_start": w.window_start,
                            "window_end": w.window_end,
                            "cagr": w.result.cagr,
                            "sharpe": w.result.sharpe,
                            "mdd": w.result.mdd,
                        })
                    })
                    .collect::<Vec<_>>(),
            )?;
            std::fs::write(out, json)?;
        }
        Command::BootstrapPnl { file, iterations, out } => {
            let equity = read_equity_file(&file)?;
            let returns = bootstrap::derive_returns(&equity);
            let mut rng = rand::thread_rng();
            let result = bootstrap::bootstrap_mdd(&returns, iterations, &mut rng);
            let json = serde_json::json!({
                "iterations": result.iterations,
                "mdd_lower": result.mdd_lower,
                "mdd_upper": result.mdd_upper,
            });
            match out {
                Some(path) => std::fs::write(path, serde_json::to_string_pretty(&json)?)?,
                None => println!("{}", serde_json::to_string_pretty(&json)?),
            }
        }
    }

    Ok(())
}

async fn resolve_tickers(storage: &Storage, stocks: Option<String>) -> anyhow::Result<Vec<String>> {
    if let Some(csv) = stocks {
        return Ok(csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
    }
    let listings = universe::list(storage).await?;
    Ok(listings.into_iter().map(|l| l.ticker).collect())
}

/// Shared dispatch into the batch executor (C4) for any per-ticker fetch
/// closure. `worker` receives owned `Arc` clones so it satisfies the
/// executor's `'static` bound.
async fn run_fetch<Fut, F>(
    config: &Config,
    ctx: &Arc<FetchContext>,
    storage: &Arc<Storage>,
    task_name: &str,
    tickers: Vec<String>,
    worker: F,
) -> anyhow::Result<()>
where
    F: Fn(Arc<FetchContext>, Arc<Storage>, String) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = tw_equity_screener::error::Result<()>> + Send + 'static,
{
    let ledger_path = config.progress_ledger_path(task_name);
    let ctx = ctx.clone();
    let storage = storage.clone();
    let options = ExecutorOptions { concurrency: config.fetch_concurrency, ..ExecutorOptions::default() };
    let result = executor::run_batch(task_name, ledger_path, tickers, options, move |ticker| {
        let ctx = ctx.clone();
        let storage = storage.clone();
        let worker = worker.clone();
        async move { worker(ctx, storage, ticker).await }
    })
    .await?;
    info!(
        task = task_name,
        successful = result.successful.len(),
        failed = result.failed.len(),
        skipped = result.skipped.len(),
        "fetch command finished"
    );
    Ok(())
}

async fn print_update_status(config: &Config) -> anyhow::Result<()> {
    for name in ["fetch-price", "fetch-growth", "fetch-quality", "fetch-fund-flow", "fetch-momentum"] {
        let path = config.progress_ledger_path(name);
        match tw_equity_screener::executor::progress::ProgressLedger::load(&path) {
            Some(ledger) => println!(
                "{name}: {}/{} processed, {} failed, quota_exceeded={}",
                ledger.processed.len(),
                ledger.total,
                ledger.failed.len(),
                ledger.quota_exceeded
            ),
            None => println!("{name}: no progress ledger (never run, or stale)"),
        }
    }
    Ok(())
}

fn parse_weights(raw: &str) -> anyhow::Result<Weights> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("invalid --weights; expected v,g,q,c,m"))?;
    if parts.len() != 5 {
        return Err(anyhow::anyhow!("--weights needs exactly 5 comma-separated values"));
    }
    Ok(Weights { valuation: parts[0], growth: parts[1], quality: parts[2], chips: parts[3], momentum: parts[4] }.normalized())
}

fn parse_method(raw: &str) -> anyhow::Result<Method> {
    match raw {
        "zscore" => Ok(Method::ZScore),
        "percentile" => Ok(Method::Percentile),
        "rolling" => Ok(Method::Rolling),
        other => Err(anyhow::anyhow!("unknown --method: {other}")),
    }
}

fn parse_mode(raw: &str) -> anyhow::Result<Mode> {
    match raw {
        "equal" => Ok(Mode::Equal),
        "cap" => Ok(Mode::Cap),
        other => Err(anyhow::anyhow!("unknown --mode: {other}")),
    }
}

fn parse_usize_csv(raw: &str) -> anyhow::Result<Vec<usize>> {
    raw.split(',')
        .map(|s| s.trim().parse::<usize>().map_err(|_| anyhow::anyhow!("invalid integer in list: {s}")))
        .collect()
}

async fn score_all(storage: &Storage, tickers: &[String], as_of: NaiveDate, config: ScoringConfig) -> anyhow::Result<Vec<ScoredRank>> {
    let mut out = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        out.push(scoring::score_ticker(storage, ticker, as_of, config).await?);
    }
    Ok(out)
}

fn print_ranks(ranks: &[ScoredRank]) {
    println!("{:<8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}", "ticker", "total", "val", "growth", "qual", "chips", "mom");
    for r in ranks {
        println!(
            "{:<8} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            r.ticker, r.total, r.valuation, r.growth, r.quality, r.chips, r.momentum
        );
    }
}

fn print_stocks(listings: &[tw_equity_screener::models::StockListing], scores: &HashMap<String, f64>, show_scores: bool) {
    for listing in listings {
        if show_scores {
            let score = scores.get(&listing.ticker).copied().unwrap_or(0.0);
            println!("{}\t{}\t{}\t{:.2}", listing.ticker, listing.name, listing.market.as_str(), score);
        } else {
            println!("{}\t{}\t{}", listing.ticker, listing.name, listing.market.as_str());
        }
    }
}

fn export_stocks_csv(listings: &[tw_equity_screener::models::StockListing], scores: &HashMap<String, f64>, show_scores: bool) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    if show_scores {
        writer.write_record(["ticker", "name", "industry", "market", "score"])?;
    } else {
        writer.write_record(["ticker", "name", "industry", "market"])?;
    }
    for listing in listings {
        let industry = listing.industry.clone().unwrap_or_default();
        if show_scores {
            let score = scores.get(&listing.ticker).copied().unwrap_or(0.0);
            writer.write_record([&listing.ticker, &listing.name, &industry, listing.market.as_str(), &score.to_string()])?;
        } else {
            writer.write_record([&listing.ticker, &listing.name, &industry, listing.market.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn export_stocks_json(listings: &[tw_equity_screener::models::StockListing], scores: &HashMap<String, f64>, show_scores: bool) -> anyhow::Result<()> {
    let rows: Vec<serde_json::Value> = listings
        .iter()
        .map(|l| {
            let mut row = serde_json::json!({
                "ticker": l.ticker,
                "name": l.name,
                "industry": l.industry,
                "market": l.market.as_str(),
            });
            if show_scores {
                row["score"] = serde_json::json!(scores.get(&l.ticker).copied().unwrap_or(0.0));
            }
            row
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

async fn load_price_series(
    storage: &Storage,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<HashMap<String, Vec<tw_equity_screener::models::PriceBar>>> {
    let mut out = HashMap::with_capacity(tickers.len());
    for ticker in tickers {
        let bars = price_storage::range(&storage.price, ticker, start, end).await?;
        if !bars.is_empty() {
            out.insert(ticker.clone(), bars);
        }
    }
    Ok(out)
}

/// Scores every ticker in `prices` at every date in the sorted union of
/// their bars, building the `ranks` map the back-test kernel consumes.
/// Market cap is not a tracked factor input today, so `Mode::Cap` always
/// falls back to equal weighting (see `DESIGN.md`).
async fn build_ranks(
    storage: &Storage,
    prices: &HashMap<String, Vec<tw_equity_screener::models::PriceBar>>,
    config: ScoringConfig,
) -> anyhow::Result<HashMap<NaiveDate, Vec<RankedTicker>>> {
    let mut calendar: Vec<NaiveDate> = prices.values().flat_map(|bars| bars.iter().map(|b| b.date)).collect::<std::collections::BTreeSet<_>>().into_iter().collect();
    calendar.sort();

    let mut ranks = HashMap::with_capacity(calendar.len());
    for date in calendar {
        let mut row = Vec::with_capacity(prices.len());
        for ticker in prices.keys() {
            let scored = scoring::score_ticker(storage, ticker, date, config).await?;
            row.push(RankedTicker { ticker: ticker.clone(), score: scored.total, market_cap: None });
        }
        ranks.insert(date, row);
    }
    Ok(ranks)
}

fn read_equity_file(path: &std::path::Path) -> anyhow::Result<Vec<f64>> {
    let contents = std::fs::read_to_string(path)?;
    let mut values = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("equity") {
            continue;
        }
        values.push(trimmed.parse::<f64>().map_err(|_| anyhow::anyhow!("invalid equity value: {trimmed}"))?);
    }
    if values.is_empty() {
        return Err(anyhow::anyhow!("equity file {} has no values", path.display()));
    }
    Ok(values)
}
