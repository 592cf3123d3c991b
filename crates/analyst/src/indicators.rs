//! Rolling-window statistics over daily closes
//!
//! Windowed series are returned with the same length as their input. Slots
//! where the window is not yet full hold `None`, so callers can align them
//! with the price bars by index.

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (one delta degree of freedom)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

fn rolling<F>(values: &[f64], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                stat(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Simple returns between consecutive values; one element shorter than the input
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// Natural-log returns between consecutive values; one element shorter than the input
pub fn log_returns(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Exponential moving average seeded with the first value, smoothing
/// factor `2 / (span + 1)`
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let next = if i == 0 {
            *value
        } else {
            alpha * value + (1.0 - alpha) * out[i - 1]
        };
        out.push(next);
    }
    out
}

/// Relative strength index from simple rolling means of gains and losses.
///
/// The first bar has no change and contributes a zero gain and loss, so the
/// first value appears at index `period - 1`.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let delta = if i == 0 { 0.0 } else { values[i] - values[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(gain, loss)| match (gain?, loss?) {
            (g, l) if l == 0.0 && g == 0.0 => None,
            (_, l) if l == 0.0 => Some(100.0),
            (g, l) => Some(100.0 - 100.0 / (1.0 + g / l)),
        })
        .collect()
}

/// Last slot of a windowed series
pub fn last(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round, mapping non-finite results to `None`
pub fn rounded(value: Option<f64>, decimals: i32) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| round_to(v, decimals))
}
