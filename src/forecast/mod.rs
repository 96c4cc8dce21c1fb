//! Future-value prediction over the fitted shared model.
//!
//! Two inference modes exist. Model mode is recursive: each horizon step
//! builds feature rows from the history extended with the predictions of
//! earlier steps, so lag features inside the horizon consume predicted
//! values, never future actuals. Naive mode tiles each series' last seasonal
//! cycle of preprocessed rows across the horizon and runs the model once over
//! the tiled frame.

use crate::core::FeatureFrame;
use crate::dataset::AssembledPanel;
use crate::error::{ForecastError, Result};
use crate::features::{calendar, FeatureBuilder};
use crate::model::GbmRegressor;
use crate::profile::FrequencyProfile;
use chrono::{DateTime, Utc};
use ndarray::Array2;

/// How future feature rows are produced. Selected once at configuration
/// time, never as a fallback on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStrategy {
    /// Recursive multi-horizon inference over freshly built feature rows.
    Model,
    /// Single-shot inference over seasonally tiled historical rows.
    SeasonalNaive,
}

impl ForecastStrategy {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "naive" | "seasonal_naive" => Ok(Self::SeasonalNaive),
            other => Err(ForecastError::InvalidParameter(format!(
                "unknown forecast strategy: {other}"
            ))),
        }
    }
}

/// One forecast value for one series at one future timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Builds the tiled future frame for naive-mode inference.
///
/// The last seasonal cycle of each series' preprocessed rows becomes a
/// repeating template. Lag and transform features keep their template values;
/// calendar features are re-derived for the shifted timestamps and temporal
/// attributes re-merged, since both are knowable for future dates.
pub struct NaiveForecastBuilder<'a> {
    profile: &'a FrequencyProfile,
}

impl<'a> NaiveForecastBuilder<'a> {
    pub fn new(profile: &'a FrequencyProfile) -> Self {
        Self { profile }
    }

    /// Tile `frame` forward to cover `horizon` future periods per series.
    pub fn tiled_frame(
        &self,
        frame: &FeatureFrame,
        assembled: &AssembledPanel,
        horizon: usize,
    ) -> Result<FeatureFrame> {
        validate_horizon(horizon)?;
        let season = self.profile.seasonality();
        let period = self.profile.period();
        let template = frame.tail_per_series(season);
        let reps = (horizon + season - 1) / season;

        let mut tiled = FeatureFrame::new(&frame.schema());
        for rep in 1..=reps {
            let mut copy = template.clone();
            copy.shift_timestamps(period * (rep * season) as i32);
            tiled.append(&copy)?;
        }
        tiled.sort_rows();
        let mut tiled = tiled.head_per_series(horizon);

        for &feature in self.profile.date_features() {
            let values = tiled
                .timestamps()
                .iter()
                .map(|&ts| calendar::extract(feature, ts))
                .collect();
            tiled.set_column(feature.name(), values)?;
        }
        if let Some(temporal) = &assembled.temporal_features {
            for (j, (name, _)) in temporal.columns().iter().enumerate() {
                let values = tiled
                    .ids()
                    .iter()
                    .zip(tiled.timestamps())
                    .map(|(id, &ts)| temporal.get(id, ts).map(|r| r[j]).unwrap_or(f64::NAN))
                    .collect();
                tiled.set_column(name, values)?;
            }
        }
        Ok(tiled)
    }
}

/// Produces horizon forecasts for every series of a panel.
pub struct Predictor<'a> {
    profile: &'a FrequencyProfile,
}

impl<'a> Predictor<'a> {
    pub fn new(profile: &'a FrequencyProfile) -> Self {
        Self { profile }
    }

    /// Recursive multi-step forecast.
    ///
    /// Rows come back grouped by series in ascending id order, each group
    /// covering exactly `horizon` consecutive future periods.
    pub fn model_forecast(
        &self,
        assembled: &AssembledPanel,
        model: &GbmRegressor,
        horizon: usize,
    ) -> Result<Vec<ForecastRow>> {
        validate_horizon(horizon)?;
        let builder = FeatureBuilder::new(self.profile);
        let n_features = builder.schema(assembled).len();
        let series = assembled.panel.series();
        let period = self.profile.period();

        let mut last: Vec<DateTime<Utc>> = Vec::with_capacity(series.len());
        for s in series {
            last.push(s.last_timestamp().ok_or(ForecastError::EmptyData)?);
        }
        let mut histories: Vec<Vec<f64>> =
            series.iter().map(|s| s.values().to_vec()).collect();
        let mut per_series: Vec<Vec<ForecastRow>> =
            vec![Vec::with_capacity(horizon); series.len()];

        for step in 0..horizon {
            let offset = period * (step as i32 + 1);
            let mut flat = Vec::with_capacity(series.len() * n_features);
            for (i, s) in series.iter().enumerate() {
                flat.extend(builder.future_row(s.id(), &histories[i], last[i] + offset, assembled));
            }
            let x = Array2::from_shape_vec((series.len(), n_features), flat)
                .map_err(|e| ForecastError::ComputationError(e.to_string()))?;
            let predictions = model.predict(&x)?;

            for (i, s) in series.iter().enumerate() {
                histories[i].push(predictions[i]);
                per_series[i].push(ForecastRow {
                    id: s.id().to_string(),
                    timestamp: last[i] + offset,
                    value: predictions[i],
                });
            }
        }

        Ok(per_series.into_iter().flatten().collect())
    }

    /// Single-shot forecast over the seasonally tiled frame.
    pub fn naive_forecast(
        &self,
        frame: &FeatureFrame,
        assembled: &AssembledPanel,
        model: &GbmRegressor,
        horizon: usize,
    ) -> Result<Vec<ForecastRow>> {
        let tiled = NaiveForecastBuilder::new(self.profile).tiled_frame(frame, assembled, horizon)?;
        let predictions = model.predict(&tiled.to_matrix())?;

        Ok(tiled
            .ids()
            .iter()
            .zip(tiled.timestamps())
            .zip(predictions)
            .map(|((id, &timestamp), value)| ForecastRow {
                id: id.clone(),
                timestamp,
                value,
            })
            .collect())
    }
}

fn validate_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "forecast horizon must be at least 1".to_string(),
        ));
    }
    Ok(())
}
