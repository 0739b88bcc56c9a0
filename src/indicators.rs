//! Technical indicator math used by the Momentum fetcher (spec §4.4
//! "Momentum"). Pure, single-threaded, deterministic functions over a
//! close-price series; no I/O. Indices line up 1:1 with the input slice —
//! `SMA(n)[i]` is only defined for `i >= n-1` and is `None` before that.

/// `SMA(n)[i] = mean(close[i-n+1..=i])`, `None` before warm-up.
pub fn sma(closes: &[f64], n: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if n == 0 {
        return out;
    }
    for i in (n - 1)..closes.len() {
        let window = &closes[i + 1 - n..=i];
        out[i] = Some(window.iter().sum::<f64>() / n as f64);
    }
    out
}

/// `EMA(n)[0..n-1] = None`; `EMA(n)[n-1] = SMA(n)` over the first `n` bars;
/// then `EMA[i] = k*close[i] + (1-k)*EMA[i-1]`, `k = 2/(n+1)` (spec §4.4).
pub fn ema(closes: &[f64], n: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if n == 0 || closes.len() < n {
        return out;
    }
    let k = 2.0 / (n as f64 + 1.0);
    let seed = closes[..n].iter().sum::<f64>() / n as f64;
    out[n - 1] = Some(seed);
    let mut prev = seed;
    for i in n..closes.len() {
        let value = k * closes[i] + (1.0 - k) * prev;
        out[i] = Some(value);
        prev = value;
    }
    out
}

/// RSI(14) with simple (unsmoothed) averages over each 14-bar window. An
/// all-loss-free window (zero average loss) reports RSI = 100, matching
/// the spec's explicit edge case rather than dividing by zero.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }
    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else {
            losses[i] = -delta;
        }
    }
    for i in period..closes.len() {
        let avg_gain: f64 = gains[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        let avg_loss: f64 = losses[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        out[i] = if avg_loss == 0.0 {
            Some(100.0)
        } else {
            let rs = avg_gain / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        };
    }
    out
}

/// `MACD = EMA(12) - EMA(26)`, aligned on the longer (26-bar) series —
/// `None` wherever either leg is undefined.
pub fn macd(closes: &[f64], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect()
}

pub struct Bollinger {
    pub upper: Vec<Option<f64>>,
    pub mid: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// `Bollinger(n, k)`: middle = SMA(n); bands = middle +/- k * population
/// sigma over the same n-bar window (spec §4.4).
pub fn bollinger(closes: &[f64], n: usize, k: f64) -> Bollinger {
    let mid = sma(closes, n);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];
    if n == 0 {
        return Bollinger { upper, mid, lower };
    }
    for i in (n - 1)..closes.len() {
        let Some(mean) = mid[i] else { continue };
        let window = &closes[i + 1 - n..=i];
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;
        let sigma = variance.sqrt();
        upper[i] = Some(mean + k * sigma);
        lower[i] = Some(mean - k * sigma);
    }
    Bollinger { upper, mid, lower }
}

/// `100 * (close[last] - close[last-offset]) / close[last-offset]`, `None`
/// when the offset index doesn't exist.
pub fn trailing_return(closes: &[f64], offset: usize) -> Option<f64> {
    let last = closes.len().checked_sub(1)?;
    let prior = last.checked_sub(offset)?;
    let base = closes[prior];
    if base == 0.0 {
        return None;
    }
    Some(100.0 * (closes[last] - base) / base)
}

/// Count of bars where MA20 > MA60, aligned by absolute bar index and
/// skipping indices where either is undefined (spec §9 REDESIGN FLAGS:
/// `countMA20AboveMA60Days` must align both series by absolute index
/// rather than by position within each series' own valid range).
pub fn count_ma20_above_ma60(ma20: &[Option<f64>], ma60: &[Option<f64>]) -> i64 {
    ma20.iter()
        .zip(ma60.iter())
        .filter(|(a, b)| matches!((a, b), (Some(a), Some(b)) if a > b))
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_undefined_before_warmup() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&closes, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn ema_seeds_with_sma_then_recurses() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ema(&closes, 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0)); // seed = SMA(3) of [1,2,3]
        let k = 2.0 / 4.0;
        let expected = k * 4.0 + (1.0 - k) * 2.0;
        assert!((out[3].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_is_100_when_no_losses() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn rsi_classic_textbook_case() {
        // Monotonic gain/loss alternation producing a known RS.
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28,
        ];
        let out = rsi(&closes, 14);
        let last = out[14].unwrap();
        assert!(last > 50.0 && last < 100.0);
    }

    #[test]
    fn macd_none_until_slow_leg_warms_up() {
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let out = macd(&closes, 12, 26);
        assert_eq!(out[24], None);
        assert!(out[25].is_some());
    }

    #[test]
    fn bollinger_bands_bracket_the_mean() {
        let closes = vec![10.0, 11.0, 9.0, 10.0, 12.0, 8.0, 10.0, 11.0, 9.0, 10.0, 13.0, 7.0,
                           10.0, 11.0, 9.0, 10.0, 12.0, 8.0, 10.0, 11.0];
        let bands = bollinger(&closes, 20, 2.0);
        let mid = bands.mid[19].unwrap();
        let upper = bands.upper[19].unwrap();
        let lower = bands.lower[19].unwrap();
        assert!(upper > mid && mid > lower);
    }

    #[test]
    fn trailing_return_none_when_offset_missing() {
        let closes = vec![100.0, 101.0];
        assert_eq!(trailing_return(&closes, 22), None);
    }

    #[test]
    fn ma20_above_ma60_aligns_by_absolute_index() {
        let ma20 = vec![None, Some(10.0), Some(11.0), None];
        let ma60 = vec![None, Some(9.0), Some(12.0), Some(5.0)];
        // index 0: both None -> skip; index 1: 10>9 true; index 2: 11>12 false; index 3: ma20 None -> skip
        assert_eq!(count_ma20_above_ma60(&ma20, &ma60), 1);
    }
}
