//! Per-series lag, lag-transform and calendar feature generation.
//!
//! Every derived value for a row at time `t` uses only observations strictly
//! earlier than `t` within the same series: lag features shift the target by
//! `k` periods, and lag transforms are computed over the full history first
//! and then shifted by their anchor lag, so the trailing window ends at the
//! lag, never at the current row.

use crate::core::{FeatureFrame, SeriesHistory};
use crate::dataset::AssembledPanel;
use crate::error::{ForecastError, Result};
use crate::features::{calendar, window};
use crate::profile::{FrequencyProfile, LagTransform};
use chrono::{DateTime, Utc};
use rayon::prelude::*;

/// Builds preprocessed feature rows from an assembled panel.
pub struct FeatureBuilder<'a> {
    profile: &'a FrequencyProfile,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(profile: &'a FrequencyProfile) -> Self {
        Self { profile }
    }

    /// Column order of every frame this builder produces:
    /// lags, lag transforms, calendar features, static pass-through,
    /// temporal pass-through.
    pub fn schema(&self, assembled: &AssembledPanel) -> Vec<(String, bool)> {
        let mut schema = Vec::new();
        for &lag in self.profile.lags() {
            schema.push((format!("lag{lag}"), false));
        }
        for (lag, transforms) in self.profile.lag_transforms() {
            for transform in transforms {
                schema.push((transform.feature_name(*lag), false));
            }
        }
        for feature in self.profile.date_features() {
            schema.push((feature.name().to_string(), false));
        }
        if let Some(statics) = &assembled.static_features {
            schema.extend(statics.columns().iter().cloned());
        }
        if let Some(temporal) = &assembled.temporal_features {
            schema.extend(temporal.columns().iter().cloned());
        }
        schema
    }

    /// Names of the plain lag columns; rows where any of these are missing
    /// carry no usable autoregressive signal and are dropped from training.
    pub fn lag_column_count(&self) -> usize {
        self.profile.lags().len()
    }

    /// Produce one training row per observation with sufficient history.
    ///
    /// Series are processed independently on the rayon worker pool. A series
    /// shorter than the maximum lag only loses its earliest rows; it is never
    /// rejected outright.
    pub fn preprocess(&self, assembled: &AssembledPanel) -> Result<FeatureFrame> {
        let schema = self.schema(assembled);

        let blocks: Vec<FeatureFrame> = assembled
            .panel
            .series()
            .par_iter()
            .map(|series| self.series_block(series, assembled, &schema))
            .collect::<Result<_>>()?;

        let mut frame = FeatureFrame::new(&schema);
        for block in &blocks {
            frame.append(block)?;
        }

        let n_lags = self.lag_column_count();
        let keep: Vec<bool> = (0..frame.len())
            .map(|i| frame.row(i)[..n_lags].iter().all(|v| !v.is_nan()))
            .collect();
        frame.retain(&keep);

        if frame.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: self.profile.max_lag() + 1,
                got: assembled
                    .panel
                    .series()
                    .iter()
                    .map(|s| s.len())
                    .max()
                    .unwrap_or(0),
            });
        }
        Ok(frame)
    }

    fn series_block(
        &self,
        series: &SeriesHistory,
        assembled: &AssembledPanel,
        schema: &[(String, bool)],
    ) -> Result<FeatureFrame> {
        let values = series.values();
        let timestamps = series.timestamps();
        let n = values.len();

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(schema.len());
        for &lag in self.profile.lags() {
            columns.push(shift(values.to_vec(), lag));
        }
        for (lag, transforms) in self.profile.lag_transforms() {
            for transform in transforms {
                columns.push(shift(apply_transform(transform, values), *lag));
            }
        }
        for &feature in self.profile.date_features() {
            columns.push(
                timestamps
                    .iter()
                    .map(|&ts| calendar::extract(feature, ts))
                    .collect(),
            );
        }
        if let Some(statics) = &assembled.static_features {
            let row = statics.get(series.id());
            for j in 0..statics.columns().len() {
                let value = row.map(|r| r[j]).unwrap_or(f64::NAN);
                columns.push(vec![value; n]);
            }
        }
        if let Some(temporal) = &assembled.temporal_features {
            for j in 0..temporal.columns().len() {
                columns.push(
                    timestamps
                        .iter()
                        .map(|&ts| {
                            temporal
                                .get(series.id(), ts)
                                .map(|r| r[j])
                                .unwrap_or(f64::NAN)
                        })
                        .collect(),
                );
            }
        }

        let mut frame = FeatureFrame::new(schema);
        let mut row = vec![0.0; columns.len()];
        for t in 0..n {
            for (j, column) in columns.iter().enumerate() {
                row[j] = column[t];
            }
            frame.push_row(series.id(), timestamps[t], values[t], &row)?;
        }
        Ok(frame)
    }

    /// Feature row for a synthetic future observation of one series.
    ///
    /// `values` is the full history up to (not including) `timestamp`; during
    /// recursive prediction it already contains earlier horizon predictions.
    pub fn future_row(
        &self,
        id: &str,
        values: &[f64],
        timestamp: DateTime<Utc>,
        assembled: &AssembledPanel,
    ) -> Vec<f64> {
        let n = values.len();
        let mut row = Vec::new();

        for &lag in self.profile.lags() {
            row.push(if n >= lag { values[n - lag] } else { f64::NAN });
        }
        for (lag, transforms) in self.profile.lag_transforms() {
            for transform in transforms {
                if n >= *lag {
                    row.push(apply_transform(transform, values)[n - lag]);
                } else {
                    row.push(f64::NAN);
                }
            }
        }
        for &feature in self.profile.date_features() {
            row.push(calendar::extract(feature, timestamp));
        }
        if let Some(statics) = &assembled.static_features {
            match statics.get(id) {
                Some(r) => row.extend_from_slice(r),
                None => row.extend(std::iter::repeat(f64::NAN).take(statics.columns().len())),
            }
        }
        if let Some(temporal) = &assembled.temporal_features {
            match temporal.get(id, timestamp) {
                Some(r) => row.extend_from_slice(r),
                None => row.extend(std::iter::repeat(f64::NAN).take(temporal.columns().len())),
            }
        }
        row
    }
}

/// Apply a lag transform to a full series; output stays index-aligned.
pub fn apply_transform(transform: &LagTransform, series: &[f64]) -> Vec<f64> {
    match transform {
        LagTransform::RollingMean { window: w } => window::rolling_mean(series, *w),
        LagTransform::ExpandingMean => window::expanding_mean(series),
        LagTransform::EwmMean { alpha } => window::ewm_mean(series, *alpha),
        LagTransform::SeasonalRollingMean {
            season_length,
            window: w,
        } => window::seasonal_rolling_mean(series, *season_length, *w),
    }
}

/// Shift a derived column forward by `lag` periods, NaN-filling the head.
fn shift(base: Vec<f64>, lag: usize) -> Vec<f64> {
    let n = base.len();
    (0..n)
        .map(|t| if t >= lag { base[t - lag] } else { f64::NAN })
        .collect()
}
