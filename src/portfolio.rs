//! Portfolio builder (C7, spec §4.7): turns scored ranks for a single date
//! into target weights. Pure function over in-memory structs; storage
//! access (ADTV lookups) happens at the call site so this module stays
//! deterministic and easily testable.

use std::collections::HashMap;

use crate::models::TargetWeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Equal,
    Cap,
}

#[derive(Debug, Clone, Copy)]
pub struct PortfolioOptions {
    pub top: usize,
    pub mode: Mode,
}

#[derive(Debug, Clone)]
pub struct RankedTicker {
    pub ticker: String,
    pub score: f64,
    pub market_cap: Option<f64>,
}

/// Picks the top-`top` tickers by score (ties broken by ticker id
/// ascending) and assigns weights per `mode` (spec §4.7). `cap` mode falls
/// back to `equal` if any selected ticker is missing a market cap.
pub fn build_weights(ranks: &[RankedTicker], options: PortfolioOptions) -> TargetWeights {
    if options.top == 0 || ranks.is_empty() {
        return HashMap::new();
    }

    let mut sorted: Vec<&RankedTicker> = ranks.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    let selected: Vec<&RankedTicker> = sorted.into_iter().take(options.top).collect();

    match options.mode {
        Mode::Equal => equal_weight(&selected),
        Mode::Cap => {
            if selected.iter().all(|r| r.market_cap.is_some()) {
                cap_weight(&selected)
            } else {
                equal_weight(&selected)
            }
        }
    }
}

fn equal_weight(selected: &[&RankedTicker]) -> TargetWeights {
    let w = 1.0 / selected.len() as f64;
    selected.iter().map(|r| (r.ticker.clone(), w)).collect()
}

fn cap_weight(selected: &[&RankedTicker]) -> TargetWeights {
    let total: f64 = selected.iter().filter_map(|r| r.market_cap).sum();
    if total <= 0.0 {
        return equal_weight(selected);
    }
    selected
        .iter()
        .map(|r| (r.ticker.clone(), r.market_cap.unwrap_or(0.0) / total))
        .collect()
}

const ADTV_FLOOR: f64 = 10_000_000.0;
const ADTV_CAP_FRACTION: f64 = 0.1;

/// Optional ADTV clip (spec §4.7 C7.1): zeroes out illiquid names and caps
/// everyone else's weight at `0.1 * ADTV`. `adtv` is keyed by ticker; a
/// ticker absent from the map is treated as having zero turnover (clipped
/// to zero) rather than left unclipped.
pub fn apply_adtv_clip(weights: &mut TargetWeights, adtv: &HashMap<String, f64>) {
    for (ticker, w) in weights.iter_mut() {
        let turnover = adtv.get(ticker).copied().unwrap_or(0.0);
        if turnover < ADTV_FLOOR {
            *w = 0.0;
        } else {
            *w = w.min(ADTV_CAP_FRACTION * turnover);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ticker: &str, score: f64, mcap: Option<f64>) -> RankedTicker {
        RankedTicker { ticker: ticker.to_string(), score, market_cap: mcap }
    }

    #[test]
    fn equal_weight_splits_evenly() {
        let ranks = vec![ranked("A", 2.0, None), ranked("B", 1.0, None)];
        let weights = build_weights(&ranks, PortfolioOptions { top: 2, mode: Mode::Equal });
        assert_eq!(weights.get("A"), Some(&0.5));
        assert_eq!(weights.get("B"), Some(&0.5));
    }

    #[test]
    fn cap_weight_proportional_to_market_cap() {
        let ranks = vec![ranked("A", 2.0, Some(200.0)), ranked("B", 1.0, Some(100.0))];
        let weights = build_weights(&ranks, PortfolioOptions { top: 2, mode: Mode::Cap });
        assert!((weights["A"] - 2.0 / 3.0).abs() < 1e-9);
        assert!((weights["B"] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn cap_weight_falls_back_to_equal_without_full_market_cap_coverage() {
        let ranks = vec![ranked("A", 2.0, Some(200.0)), ranked("B", 1.0, None)];
        let weights = build_weights(&ranks, PortfolioOptions { top: 2, mode: Mode::Cap });
        assert_eq!(weights.get("A"), Some(&0.5));
        assert_eq!(weights.get("B"), Some(&0.5));
    }

    #[test]
    fn ties_broken_by_ticker_ascending() {
        let ranks = vec![ranked("B", 1.0, None), ranked("A", 1.0, None), ranked("C", 1.0, None)];
        let weights = build_weights(&ranks, PortfolioOptions { top: 2, mode: Mode::Equal });
        assert!(weights.contains_key("A"));
        assert!(weights.contains_key("B"));
        assert!(!weights.contains_key("C"));
    }

    #[test]
    fn adtv_clip_zeroes_illiquid_names() {
        let mut weights: TargetWeights = [("A".to_string(), 0.5), ("B".to_string(), 0.5)].into_iter().collect();
        let adtv: HashMap<String, f64> = [("A".to_string(), 1_000_000.0), ("B".to_string(), 50_000_000.0)].into_iter().collect();
        apply_adtv_clip(&mut weights, &adtv);
        assert_eq!(weights["A"], 0.0);
        assert!(weights["B"] <= 0.1 * 50_000_000.0);
    }
}
