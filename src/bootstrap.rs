//! Bootstrap PnL (C11, spec §4.10): empirical resampling of an equity
//! curve's per-step returns to estimate a confidence interval on max
//! drawdown. Pure CPU; the caller supplies the RNG so results stay
//! reproducible in tests.

use rand::Rng;

use crate::backtest::kernel::max_drawdown;

const DEFAULT_ITERATIONS: usize = 1000;
const LOWER_PERCENTILE: f64 = 0.025;
const UPPER_PERCENTILE: f64 = 0.975;

#[derive(Debug, Clone, Copy)]
pub struct BootstrapResult {
    pub iterations: usize,
    pub mdd_lower: f64,
    pub mdd_upper: f64,
}

/// Resamples `returns` with replacement `iterations` times, reconstructs an
/// equity path from 1.0 each time, and reports the 2.5th/97.5th percentiles
/// of the resulting MDD distribution.
pub fn bootstrap_mdd<R: Rng>(returns: &[f64], iterations: Option<usize>, rng: &mut R) -> BootstrapResult {
    let iterations = iterations.unwrap_or(DEFAULT_ITERATIONS);
    if returns.is_empty() || iterations == 0 {
        return BootstrapResult { iterations: 0, mdd_lower: 0.0, mdd_upper: 0.0 };
    }

    let mut mdds: Vec<f64> = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let mut equity = Vec::with_capacity(returns.len() + 1);
        equity.push(1.0);
        for _ in 0..returns.len() {
            let idx = rng.gen_range(0..returns.len());
            let last = *equity.last().unwrap();
            equity.push(last * (1.0 + returns[idx]));
        }
        mdds.push(max_drawdown(&equity));
    }
    mdds.sort_by(|a, b| a.partial_cmp(b).unwrap());

    BootstrapResult {
        iterations,
        mdd_lower: percentile(&mdds, LOWER_PERCENTILE),
        mdd_upper: percentile(&mdds, UPPER_PERCENTILE),
    }
}

/// Linear-interpolated percentile over an already-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

pub fn derive_returns(equity: &[f64]) -> Vec<f64> {
    equity.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}
