// Indicator toolkit
// Slice-based calculations over candle snapshots; Wilder smoothing for ATR/RSI

use common::Candle;

/// Simple moving average over the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average seeded with the first value.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.is_empty() {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[0];
    for &value in &values[1..] {
        current = (value - current) * k + current;
    }
    Some(current)
}

/// Average true range with Wilder's smoothing (RMA).
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 {
        return None;
    }
    let alpha = 1.0 / period as f64;
    let mut value = candles[0].high - candles[0].low;
    for pair in candles.windows(2) {
        let prev_close = pair[0].close;
        let candle = pair[1];
        let tr = (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs());
        value += alpha * (tr - value);
    }
    Some(value)
}

/// Relative strength index with Wilder's smoothing.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let n = period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for (i, pair) in closes.windows(2).enumerate() {
        let change = pair[1] - pair[0];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if i < period {
            avg_gain += gain / n;
            avg_loss += loss / n;
        } else {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        }
    }
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Rate of change over `period` bars, as a fraction.
pub fn roc(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }
    let past = closes[closes.len() - 1 - period];
    if past == 0.0 {
        return None;
    }
    Some((closes[closes.len() - 1] - past) / past)
}

/// Bollinger bands: (lower, middle, upper) at `std_devs` standard deviations.
pub fn bollinger(closes: &[f64], period: usize, std_devs: f64) -> Option<(f64, f64, f64)> {
    let middle = sma(closes, period)?;
    let window = &closes[closes.len() - period..];
    let variance =
        window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let sd = variance.sqrt();
    Some((middle - std_devs * sd, middle, middle + std_devs * sd))
}

/// On-balance volume series over the candles.
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut series = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    for (i, candle) in candles.iter().enumerate() {
        if i > 0 {
            if candle.close > candles[i - 1].close {
                running += candle.volume;
            } else if candle.close < candles[i - 1].close {
                running -= candle.volume;
            }
        }
        series.push(running);
    }
    series
}

/// Standard deviation of bar-to-bar returns over the last `period` bars.
pub fn return_std(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period + 1 {
        return None;
    }
    let window = &closes[closes.len() - period - 1..];
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|p| p[0] != 0.0)
        .map(|p| (p[1] - p[0]) / p[0])
        .collect();
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    Some(variance.sqrt())
}
