//! Simple Moving Average.
//!
//! SMA[i] = mean(values[i+1-n..=i]). Warmup: the first (n-1) points are
//! `None`, matching a trailing rolling window that includes the current value.

pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            out.push(None);
        } else {
            let window = &values[i + 1 - period..=i];
            out.push(Some(window.iter().sum::<f64>() / period as f64));
        }
    }
    out
}
