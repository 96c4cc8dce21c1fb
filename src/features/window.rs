//! Trailing window statistics used as lag transforms.
//!
//! All functions are causal: the value at index `i` uses only observations at
//! or before `i`. Positions without a full window are NaN.

/// Trailing rolling mean over the last `window` observations.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    if window == 0 {
        return vec![f64::NAN; n];
    }

    let mut result = vec![f64::NAN; n];
    let mut sum = 0.0;
    for i in 0..n {
        sum += series[i];
        if i >= window {
            sum -= series[i - window];
        }
        if i + 1 >= window {
            result[i] = sum / window as f64;
        }
    }
    result
}

/// Cumulative mean of all observations up to each index.
pub fn expanding_mean(series: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(series.len());
    let mut sum = 0.0;
    for (i, &x) in series.iter().enumerate() {
        sum += x;
        result.push(sum / (i + 1) as f64);
    }
    result
}

/// Exponentially weighted moving average with smoothing factor `alpha`.
///
/// Higher alpha puts more weight on recent values. The first output equals
/// the first observation.
pub fn ewm_mean(series: &[f64], alpha: f64) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }

    let alpha = alpha.clamp(0.0, 1.0);
    let mut result = Vec::with_capacity(series.len());
    let mut ewm = series[0];
    result.push(ewm);
    for &x in series.iter().skip(1) {
        ewm = alpha * x + (1.0 - alpha) * ewm;
        result.push(ewm);
    }
    result
}

/// Mean of the last `window` observations from the same season, where seasons
/// repeat every `season_length` periods.
///
/// The value at index `i` averages `series[i]`, `series[i - season_length]`,
/// ... over `window` terms, NaN until one full seasonal window is available.
pub fn seasonal_rolling_mean(series: &[f64], season_length: usize, window: usize) -> Vec<f64> {
    let n = series.len();
    if season_length == 0 || window == 0 {
        return vec![f64::NAN; n];
    }

    let mut result = vec![f64::NAN; n];
    let span = (window - 1) * season_length;
    for i in span..n {
        let sum: f64 = (0..window).map(|j| series[i - j * season_length]).sum();
        result[i] = sum / window as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_mean_basic() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_mean(&series, 3);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_relative_eq!(result[2], 2.0, epsilon = 1e-10); // (1+2+3)/3
        assert_relative_eq!(result[3], 3.0, epsilon = 1e-10); // (2+3+4)/3
        assert_relative_eq!(result[4], 4.0, epsilon = 1e-10); // (3+4+5)/3
    }

    #[test]
    fn rolling_mean_window_1() {
        let series = vec![1.0, 2.0, 3.0];
        let result = rolling_mean(&series, 1);
        for (i, &x) in series.iter().enumerate() {
            assert_relative_eq!(result[i], x, epsilon = 1e-10);
        }
    }

    #[test]
    fn rolling_mean_empty() {
        assert!(rolling_mean(&[], 3).is_empty());
    }

    #[test]
    fn expanding_mean_basic() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = expanding_mean(&series);

        assert_relative_eq!(result[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result[1], 1.5, epsilon = 1e-10);
        assert_relative_eq!(result[4], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn ewm_mean_basic() {
        let series = vec![1.0, 2.0, 3.0];
        let result = ewm_mean(&series, 0.5);

        assert_relative_eq!(result[0], 1.0, epsilon = 1e-10);
        // 0.5 * 2 + 0.5 * 1
        assert_relative_eq!(result[1], 1.5, epsilon = 1e-10);
        // 0.5 * 3 + 0.5 * 1.5
        assert_relative_eq!(result[2], 2.25, epsilon = 1e-10);
    }

    #[test]
    fn ewm_mean_alpha_bounds() {
        let series = vec![1.0, 2.0, 3.0];
        // Alpha 1 tracks the series exactly; alpha 0 repeats the first value.
        assert_eq!(ewm_mean(&series, 1.0), series);
        assert_eq!(ewm_mean(&series, 0.0), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn seasonal_rolling_mean_basic() {
        // Two full weekly seasons plus two days.
        let series: Vec<f64> = (0..16).map(|i| (i % 7) as f64 + (i / 7) as f64).collect();
        let result = seasonal_rolling_mean(&series, 7, 2);

        for i in 0..7 {
            assert!(result[i].is_nan());
        }
        // Index 7: mean(series[7], series[0]) = mean(1, 0)
        assert_relative_eq!(result[7], 0.5, epsilon = 1e-10);
        // Index 14: mean(series[14], series[7]) = mean(2, 1)
        assert_relative_eq!(result[14], 1.5, epsilon = 1e-10);
    }

    #[test]
    fn seasonal_rolling_mean_window_1_is_identity() {
        let series = vec![1.0, 2.0, 3.0, 4.0];
        let result = seasonal_rolling_mean(&series, 2, 1);
        assert_eq!(result, series);
    }

    #[test]
    fn seasonal_rolling_mean_insufficient_history_is_nan() {
        let series = vec![1.0, 2.0, 3.0];
        let result = seasonal_rolling_mean(&series, 7, 4);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
