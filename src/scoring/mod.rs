//! Scoring engine (C6, spec §4.5): cross-sectional standardization of
//! per-factor metrics into a single 0-100 composite. Reads the storage
//! engine's cross-sections read-only; never mutates.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::ScoredRank;
use crate::storage::{fundamentals, quality as quality_storage, Storage};

/// Trailing window used to build the historical series for `Method::Rolling`.
/// Generous enough to cover monthly (growth) and quarterly (quality)
/// cadences as well as daily series, at the cost of an over-fetch the
/// in-memory `take(window)` below trims back down.
const ROLLING_LOOKBACK_DAYS: i64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    ZScore,
    Percentile,
    Rolling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub valuation: f64,
    pub growth: f64,
    pub quality: f64,
    pub chips: f64,
    pub momentum: f64,
}

impl Default for Weights {
    /// Fixed default vector (spec §4.5).
    fn default() -> Self {
        Self {
            valuation: 0.2,
            growth: 0.2,
            quality: 0.2,
            chips: 0.2,
            momentum: 0.2,
        }
    }
}

impl Weights {
    /// Normalizes an arbitrary positive-sum vector so components sum to 1
    /// (spec §8 "Weight normalization"). Falls back to the default vector
    /// if the sum is non-positive.
    pub fn normalized(self) -> Self {
        let sum = self.valuation + self.growth + self.quality + self.chips + self.momentum;
        if sum <= 0.0 {
            return Self::default();
        }
        Self {
            valuation: self.valuation / sum,
            growth: self.growth / sum,
            quality: self.quality / sum,
            chips: self.chips / sum,
            momentum: self.momentum / sum,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub method: Method,
    pub window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            method: Method::ZScore,
            window: 3,
        }
    }
}

struct FactorResult {
    score: f64,
    missing: Vec<String>,
}

fn clamp01_100(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// `z = (x - mean) / stdev`, population stdev; `z = 0` if stdev is zero
/// (spec §4.5 zscore method).
fn population_stats(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn zscore_component(x: f64, population: &[f64], direction: f64) -> f64 {
    let (mean, std) = population_stats(population);
    let z = if std == 0.0 { 0.0 } else { (x - mean) / std };
    clamp01_100(50.0 + direction * 10.0 * z)
}

/// Fraction of the population at or below `x`, scaled to `[0, 100]`, with
/// ties split evenly (the half-equal convention keeps the rank continuous
/// rather than biased toward either edge of a tie cluster).
fn percentile_rank(x: f64, population: &[f64]) -> f64 {
    let n = population.len() as f64;
    if n == 0.0 {
        return 50.0;
    }
    let less = population.iter().filter(|&&v| v < x).count() as f64;
    let equal = population.iter().filter(|&&v| v == x).count() as f64;
    100.0 * (less + 0.5 * equal) / n
}

fn percentile_component(x: f64, population: &[f64], direction: f64) -> f64 {
    let rank = percentile_rank(x, population);
    clamp01_100(if direction > 0.0 { rank } else { 100.0 - rank })
}

/// One metric within a factor: display key, direction (`+1.0` higher-is-
/// better, `-1.0` lower-is-better), the target ticker's current value, the
/// cross-sectional population, and (for the rolling method) the ticker's
/// own historical series to average over.
struct MetricInput {
    key: &'static str,
    direction: f64,
    value: Option<f64>,
    population: Vec<f64>,
    history: Vec<f64>,
}

fn score_factor(factor: &str, metrics: Vec<MetricInput>, method: Method, window: usize) -> FactorResult {
    let mut components = Vec::new();
    let mut missing = Vec::new();

    for metric in metrics {
        let resolved = match method {
            Method::Rolling => {
                let recent: Vec<f64> = metric.history.iter().rev().take(window).copied().collect();
                if recent.is_empty() {
                    None
                } else {
                    Some(recent.iter().sum::<f64>() / recent.len() as f64)
                }
            }
            Method::ZScore | Method::Percentile => metric.value,
        };

        match resolved {
            None => missing.push(format!("{factor}.{}", metric.key)),
            Some(x) => {
                let score = match method {
                    Method::Percentile => percentile_component(x, &metric.population, metric.direction),
                    Method::ZScore | Method::Rolling => zscore_component(x, &metric.population, metric.direction),
                };
                components.push(score);
            }
        }
    }

    if components.is_empty() {
        return FactorResult { score: 0.0, missing: vec![factor.to_string()] };
    }
    FactorResult {
        score: components.iter().sum::<f64>() / components.len() as f64,
        missing,
    }
}

/// Scores a single ticker at the latest available cross-section on or
/// before `as_of` for each factor, then composes the weighted total (spec
/// §4.5). Deterministic given identical database state.
pub async fn score_ticker(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<ScoredRank> {
    let weights = config.weights.normalized();

    let valuation = score_valuation(storage, ticker, as_of, config).await?;
    let growth = score_growth(storage, ticker, as_of, config).await?;
    let quality = score_quality(storage, ticker, as_of, config).await?;
    let chips = score_chips(storage, ticker, as_of, config).await?;
    let momentum = score_momentum(storage, ticker, as_of, config).await?;

    let total = weights.valuation * valuation.score
        + weights.growth * growth.score
        + weights.quality * quality.score
        + weights.chips * chips.score
        + weights.momentum * momentum.score;

    let mut missing = Vec::new();
    missing.extend(valuation.missing);
    missing.extend(growth.missing);
    missing.extend(quality.missing);
    missing.extend(chips.missing);
    missing.extend(momentum.missing);

    Ok(ScoredRank {
        ticker: ticker.to_string(),
        date: as_of,
        valuation: valuation.score,
        growth: growth.score,
        quality: quality.score,
        chips: chips.score,
        momentum: momentum.score,
        total,
        missing,
    })
}

async fn score_valuation(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<FactorResult> {
    let section = fundamentals::valuation_cross_section(&storage.fundamentals, as_of).await?;
    let target = section.iter().find(|r| r.ticker == ticker);
    let Some(target) = target else {
        return Ok(FactorResult { score: 0.0, missing: vec!["valuation".to_string()] });
    };

    let history = fundamentals::valuation_range(&storage.fundamentals, ticker, as_of - chrono::Duration::days(ROLLING_LOOKBACK_DAYS), as_of).await?;

    let metrics = vec![
        MetricInput {
            key: "per",
            direction: -1.0,
            value: target.per,
            population: section.iter().filter_map(|r| r.per).collect(),
            history: history.iter().filter_map(|r| r.per).collect(),
        },
        MetricInput {
            key: "pbr",
            direction: -1.0,
            value: target.pbr,
            population: section.iter().filter_map(|r| r.pbr).collect(),
            history: history.iter().filter_map(|r| r.pbr).collect(),
        },
        MetricInput {
            key: "dividend_yield",
            direction: 1.0,
            value: target.dividend_yield,
            population: section.iter().filter_map(|r| r.dividend_yield).collect(),
            history: history.iter().filter_map(|r| r.dividend_yield).collect(),
        },
    ];
    Ok(score_factor("valuation", metrics, config.method, config.window))
}

async fn score_growth(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<FactorResult> {
    let month = NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1).unwrap_or(as_of);
    let section = fundamentals::growth_cross_section(&storage.fundamentals, month).await?;
    let target = section.iter().find(|r| r.ticker == ticker);
    let Some(target) = target else {
        return Ok(FactorResult { score: 0.0, missing: vec!["growth".to_string()] });
    };

    let history = fundamentals::growth_range(&storage.fundamentals, ticker, month - chrono::Duration::days(ROLLING_LOOKBACK_DAYS), month).await?;

    let metrics = vec![
        MetricInput {
            key: "yoy",
            direction: 1.0,
            value: target.yoy,
            population: section.iter().filter_map(|r| r.yoy).collect(),
            history: history.iter().filter_map(|r| r.yoy).collect(),
        },
        MetricInput {
            key: "mom",
            direction: 1.0,
            value: target.mom,
            population: section.iter().filter_map(|r| r.mom).collect(),
            history: history.iter().filter_map(|r| r.mom).collect(),
        },
        MetricInput {
            key: "eps_qoq",
            direction: 1.0,
            value: target.eps_qoq,
            population: section.iter().filter_map(|r| r.eps_qoq).collect(),
            history: history.iter().filter_map(|r| r.eps_qoq).collect(),
        },
    ];
    Ok(score_factor("growth", metrics, config.method, config.window))
}

async fn score_quality(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<FactorResult> {
    let section = quality_storage::cross_section(&storage.quality, as_of).await?;
    let target = section.iter().find(|r| r.ticker == ticker);
    let Some(target) = target else {
        return Ok(FactorResult { score: 0.0, missing: vec!["quality".to_string()] });
    };

    let history = quality_storage::range(&storage.quality, ticker, as_of - chrono::Duration::days(ROLLING_LOOKBACK_DAYS), as_of).await?;

    let metrics = vec![
        MetricInput {
            key: "roe",
            direction: 1.0,
            value: target.roe,
            population: section.iter().filter_map(|r| r.roe).collect(),
            history: history.iter().filter_map(|r| r.roe).collect(),
        },
        MetricInput {
            key: "gross_margin",
            direction: 1.0,
            value: target.gross_margin,
            population: section.iter().filter_map(|r| r.gross_margin).collect(),
            history: history.iter().filter_map(|r| r.gross_margin).collect(),
        },
        MetricInput {
            key: "op_margin",
            direction: 1.0,
            value: target.op_margin,
            population: section.iter().filter_map(|r| r.op_margin).collect(),
            history: history.iter().filter_map(|r| r.op_margin).collect(),
        },
    ];
    Ok(score_factor("quality", metrics, config.method, config.window))
}

async fn score_chips(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<FactorResult> {
    let section = fundamentals::fund_flow_cross_section(&storage.fundamentals, as_of, 1).await?;
    let target = section.iter().find(|r| r.ticker == ticker);
    let Some(target) = target else {
        return Ok(FactorResult { score: 0.0, missing: vec!["chips".to_string()] });
    };

    let history = fundamentals::fund_flow_range(&storage.fundamentals, ticker, as_of - chrono::Duration::days(ROLLING_LOOKBACK_DAYS), as_of).await?;

    let metrics = vec![
        MetricInput {
            key: "foreign_net",
            direction: 1.0,
            value: Some(target.foreign_net as f64),
            population: section.iter().map(|r| r.foreign_net as f64).collect(),
            history: history.iter().map(|r| r.foreign_net as f64).collect(),
        },
        MetricInput {
            key: "inv_trust_net",
            direction: 1.0,
            value: Some(target.inv_trust_net as f64),
            population: section.iter().map(|r| r.inv_trust_net as f64).collect(),
            history: history.iter().map(|r| r.inv_trust_net as f64).collect(),
        },
    ];
    Ok(score_factor("chips", metrics, config.method, config.window))
}

async fn score_momentum(storage: &Storage, ticker: &str, as_of: NaiveDate, config: ScoringConfig) -> Result<FactorResult> {
    let section = fundamentals::momentum_cross_section(&storage.fundamentals, as_of).await?;
    let target = section.iter().find(|r| r.ticker == ticker);
    let Some(target) = target else {
        return Ok(FactorResult { score: 0.0, missing: vec!["momentum".to_string()] });
    };

    let history = fundamentals::momentum_range(&storage.fundamentals, ticker, as_of - chrono::Duration::days(ROLLING_LOOKBACK_DAYS), as_of).await?;

    let metrics = vec![
        MetricInput {
            key: "rsi14",
            direction: 1.0,
            value: target.rsi14,
            population: section.iter().filter_map(|r| r.rsi14).collect(),
            history: history.iter().filter_map(|r| r.rsi14).collect(),
        },
        MetricInput {
            key: "price_change_1m",
            direction: 1.0,
            value: target.price_change_1m,
            population: section.iter().filter_map(|r| r.price_change_1m).collect(),
            history: history.iter().filter_map(|r| r.price_change_1m).collect(),
        },
    ];
    Ok(score_factor("momentum", metrics, config.method, config.window))
}

use chrono::Datelike;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_default_sums_to_one() {
        let w = Weights::default().normalized();
        let sum = w.valuation + w.growth + w.quality + w.chips + w.momentum;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn arbitrary_positive_weights_normalize() {
        let w = Weights { valuation: 2.0, growth: 2.0, quality: 2.0, chips: 2.0, momentum: 2.0 }.normalized();
        assert!((w.valuation - 0.2).abs() < 1e-9);
    }

    #[test]
    fn zscore_component_is_neutral_when_population_has_no_spread() {
        let score = zscore_component(10.0, &[10.0, 10.0, 10.0], 1.0);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn zscore_component_clamped_to_0_100() {
        let score = zscore_component(1000.0, &[1.0, 2.0, 3.0], 1.0);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn percentile_component_lower_is_better_inverts_rank() {
        let population = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let high_rank = percentile_component(5.0, &population, 1.0);
        let inverted = percentile_component(5.0, &population, -1.0);
        assert!(high_rank > inverted);
    }

    #[test]
    fn score_factor_records_missing_when_no_components_available() {
        let metrics = vec![MetricInput { key: "x", direction: 1.0, value: None, population: vec![], history: vec![] }];
        let result = score_factor("growth", metrics, Method::ZScore, 3);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.missing, vec!["growth".to_string()]);
    }

    #[test]
    fn score_factor_is_always_in_range() {
        let metrics = vec![
            MetricInput { key: "a", direction: 1.0, value: Some(9999.0), population: vec![1.0, 2.0, 3.0], history: vec![] },
            MetricInput { key: "b", direction: -1.0, value: Some(-9999.0), population: vec![1.0, 2.0, 3.0], history: vec![] },
        ];
        let result = score_factor("momentum", metrics, Method::ZScore, 3);
        assert!(result.score >= 0.0 && result.score <= 100.0);
    }
}
