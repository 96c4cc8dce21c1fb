//! Rolling-window validation of the model forecast path.
//!
//! Each window freezes a training cut per series, fits a fresh model on the
//! cut, forecasts the following horizon, and compares against the held-out
//! actuals. Window cuts are disjoint: window `i` of `W` trains on all but the
//! last `(W - i) * horizon` observations of each series.

use crate::dataset::AssembledPanel;
use crate::error::{ForecastError, Result};
use crate::features::FeatureBuilder;
use crate::forecast::Predictor;
use crate::model::{GbmParams, GbmRegressor};
use crate::profile::FrequencyProfile;
use crate::report::ProgressObserver;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// One held-out observation paired with its forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actual: f64,
    pub predicted: f64,
}

/// Comparison table and score of a single validation window.
#[derive(Debug, Clone)]
pub struct WindowEvaluation {
    pub window: usize,
    pub rows: Vec<ComparisonRow>,
    pub rmse: f64,
}

/// All window evaluations plus the aggregate score.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub windows: Vec<WindowEvaluation>,
    /// Mean over windows of the per-window score, itself the mean over
    /// series of each series' RMSE.
    pub rmse: f64,
}

/// Runs rolling-window validation over an assembled panel.
pub struct BacktestEngine<'a> {
    profile: &'a FrequencyProfile,
    params: GbmParams,
    horizon: usize,
    n_windows: usize,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(
        profile: &'a FrequencyProfile,
        params: GbmParams,
        horizon: usize,
        n_windows: usize,
    ) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "backtest horizon must be at least 1".to_string(),
            ));
        }
        if n_windows == 0 {
            return Err(ForecastError::InvalidParameter(
                "backtest requires at least one window".to_string(),
            ));
        }
        params.validate()?;
        Ok(Self {
            profile,
            params,
            horizon,
            n_windows,
        })
    }

    pub fn run(
        &self,
        assembled: &AssembledPanel,
        observer: &dyn ProgressObserver,
    ) -> Result<BacktestReport> {
        let builder = FeatureBuilder::new(self.profile);
        let predictor = Predictor::new(self.profile);

        let mut windows = Vec::with_capacity(self.n_windows);
        for window in 0..self.n_windows {
            let holdout = (self.n_windows - window) * self.horizon;
            let training = AssembledPanel {
                panel: assembled
                    .panel
                    .truncated(|s| s.len().saturating_sub(holdout)),
                static_features: assembled.static_features.clone(),
                temporal_features: assembled.temporal_features.clone(),
            };
            if training.panel.is_empty() {
                return Err(ForecastError::InsufficientData {
                    needed: holdout + self.profile.max_lag() + 1,
                    got: assembled
                        .panel
                        .series()
                        .iter()
                        .map(|s| s.len())
                        .max()
                        .unwrap_or(0),
                });
            }

            let frame = builder.preprocess(&training)?;
            let mut model = GbmRegressor::new(self.params.clone())?;
            model.fit(
                &frame.to_matrix(),
                frame.targets(),
                &frame.categorical_flags(),
                &[],
                observer,
            )?;
            let forecast = predictor.model_forecast(&training, &model, self.horizon)?;

            let rows = self.comparison_rows(assembled, holdout, &forecast);
            let rmse = mean_series_rmse(&rows);
            observer.backtest_window(window, rmse);
            windows.push(WindowEvaluation { window, rows, rmse });
        }

        let rmse = windows.iter().map(|w| w.rmse).sum::<f64>() / windows.len() as f64;
        Ok(BacktestReport { windows, rmse })
    }

    /// Outer-join actuals and forecasts on (series id, timestamp), filling
    /// the missing side with zero.
    fn comparison_rows(
        &self,
        assembled: &AssembledPanel,
        holdout: usize,
        forecast: &[crate::forecast::ForecastRow],
    ) -> Vec<ComparisonRow> {
        let mut predicted: HashMap<(&str, DateTime<Utc>), f64> = HashMap::new();
        for row in forecast {
            predicted.insert((row.id.as_str(), row.timestamp), row.value);
        }

        let mut rows = Vec::new();
        for series in assembled.panel.series() {
            let n = series.len();
            let cut = n.saturating_sub(holdout);
            let end = (cut + self.horizon).min(n);

            let mut actual: HashMap<DateTime<Utc>, f64> = HashMap::new();
            let mut keys: BTreeSet<DateTime<Utc>> = BTreeSet::new();
            for t in cut..end {
                actual.insert(series.timestamps()[t], series.values()[t]);
                keys.insert(series.timestamps()[t]);
            }
            for ((id, ts), _) in &predicted {
                if *id == series.id() {
                    keys.insert(*ts);
                }
            }

            for ts in keys {
                rows.push(ComparisonRow {
                    id: series.id().to_string(),
                    timestamp: ts,
                    actual: actual.get(&ts).copied().unwrap_or(0.0),
                    predicted: predicted
                        .get(&(series.id(), ts))
                        .copied()
                        .unwrap_or(0.0),
                });
            }
        }
        rows
    }
}

/// Per-series RMSE averaged across series.
fn mean_series_rmse(rows: &[ComparisonRow]) -> f64 {
    let mut per_series: HashMap<&str, (f64, usize)> = HashMap::new();
    for row in rows {
        let entry = per_series.entry(row.id.as_str()).or_insert((0.0, 0));
        let err = row.actual - row.predicted;
        entry.0 += err * err;
        entry.1 += 1;
    }
    if per_series.is_empty() {
        return f64::NAN;
    }
    per_series
        .values()
        .map(|(sum_sq, n)| (sum_sq / *n as f64).sqrt())
        .sum::<f64>()
        / per_series.len() as f64
}
