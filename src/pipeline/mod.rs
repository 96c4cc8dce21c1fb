//! End-to-end orchestration: assemble, backtest, train, predict.
//!
//! The pipeline is a single synchronous batch job. Any stage failure aborts
//! the whole run; there is no checkpointing or retry.

use crate::backtest::{BacktestEngine, BacktestReport};
use crate::core::{FeatureFrame, Panel};
use crate::dataset::{ColumnSpec, DatasetAssembler, StaticTable, TemporalTable};
use crate::error::{ForecastError, Result};
use crate::features::FeatureBuilder;
use crate::forecast::{ForecastRow, ForecastStrategy, Predictor};
use crate::model::{EvalSet, GbmParams, GbmRegressor};
use crate::profile::{FrequencyCode, FrequencyProfile};
use crate::report::ProgressObserver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Run configuration. Hyperparameters in `model` are passed through to the
/// fitting routine verbatim.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub frequency: String,
    pub horizon: usize,
    /// Zero skips backtesting entirely; a configuration choice, not an error.
    pub backtest_windows: usize,
    pub strategy: ForecastStrategy,
    pub model: GbmParams,
    /// Share of preprocessed rows held out for fit monitoring.
    pub valid_fraction: f64,
    pub seed: u64,
    /// Key-column names of the caller's raw input tables.
    pub columns: ColumnSpec,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            frequency: "D".to_string(),
            horizon: 28,
            backtest_windows: 0,
            strategy: ForecastStrategy::Model,
            model: GbmParams::default(),
            valid_fraction: 0.1,
            seed: 0,
            columns: ColumnSpec::default(),
        }
    }
}

/// Fits the shared model on a preprocessed frame with a deterministic
/// train/validation split reported during fitting.
pub struct Trainer<'a> {
    params: &'a GbmParams,
    valid_fraction: f64,
    seed: u64,
}

impl<'a> Trainer<'a> {
    pub fn new(params: &'a GbmParams, valid_fraction: f64, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&valid_fraction) {
            return Err(ForecastError::InvalidParameter(format!(
                "valid_fraction must be in [0, 1), got {valid_fraction}"
            )));
        }
        Ok(Self {
            params,
            valid_fraction,
            seed,
        })
    }

    pub fn fit(
        &self,
        frame: &FeatureFrame,
        observer: &dyn ProgressObserver,
    ) -> Result<GbmRegressor> {
        let mask = self.split_mask(frame.len());
        let mut train = frame.clone();
        train.retain(&mask);
        let inverse: Vec<bool> = mask.iter().map(|keep| !keep).collect();
        let mut valid = frame.clone();
        valid.retain(&inverse);

        if train.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: 1,
                got: 0,
            });
        }

        let x_train = train.to_matrix();
        let x_valid = valid.to_matrix();
        let mut evals = vec![EvalSet {
            name: "train",
            x: &x_train,
            y: train.targets(),
        }];
        if !valid.is_empty() {
            evals.push(EvalSet {
                name: "valid",
                x: &x_valid,
                y: valid.targets(),
            });
        }

        let mut model = GbmRegressor::new(self.params.clone())?;
        model.fit(
            &x_train,
            train.targets(),
            &train.categorical_flags(),
            &evals,
            observer,
        )?;
        Ok(model)
    }

    /// Deterministic row partition: true keeps the row for training.
    fn split_mask(&self, n: usize) -> Vec<bool> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..n)
            .map(|_| rng.gen::<f64>() < 1.0 - self.valid_fraction)
            .collect()
    }
}

/// Terminal artifact of a pipeline run.
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub forecast: Vec<ForecastRow>,
    pub backtest: Option<BacktestReport>,
}

/// The full forecasting pipeline over one panel.
pub struct ForecastPipeline {
    config: ForecastConfig,
    profile: FrequencyProfile,
}

impl ForecastPipeline {
    /// Build a pipeline using the registry profile for the configured
    /// frequency code.
    pub fn new(config: ForecastConfig) -> Result<Self> {
        let profile = FrequencyProfile::for_code(FrequencyCode::parse(&config.frequency)?);
        Self::with_profile(config, profile)
    }

    /// Build a pipeline with a caller-supplied feature recipe.
    pub fn with_profile(config: ForecastConfig, profile: FrequencyProfile) -> Result<Self> {
        if config.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon must be at least 1".to_string(),
            ));
        }
        config.model.validate()?;
        Trainer::new(&config.model, config.valid_fraction, config.seed)?;
        Ok(Self { config, profile })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn profile(&self) -> &FrequencyProfile {
        &self.profile
    }

    pub fn run(
        &self,
        panel: Panel,
        static_table: Option<StaticTable>,
        temporal_table: Option<TemporalTable>,
        observer: &dyn ProgressObserver,
    ) -> Result<ForecastOutput> {
        observer.stage("assemble");
        let assembled = DatasetAssembler::new().assemble(panel, static_table, temporal_table)?;

        let backtest = if self.config.backtest_windows > 0 {
            observer.stage("backtest");
            let engine = BacktestEngine::new(
                &self.profile,
                self.config.model.clone(),
                self.config.horizon,
                self.config.backtest_windows,
            )?;
            Some(engine.run(&assembled, observer)?)
        } else {
            None
        };

        observer.stage("features");
        let frame = FeatureBuilder::new(&self.profile).preprocess(&assembled)?;

        observer.stage("train");
        let trainer = Trainer::new(&self.config.model, self.config.valid_fraction, self.config.seed)?;
        let model = trainer.fit(&frame, observer)?;

        observer.stage("predict");
        let predictor = Predictor::new(&self.profile);
        let forecast = match self.config.strategy {
            ForecastStrategy::Model => {
                predictor.model_forecast(&assembled, &model, self.config.horizon)?
            }
            ForecastStrategy::SeasonalNaive => {
                predictor.naive_forecast(&frame, &assembled, &model, self.config.horizon)?
            }
        };

        Ok(ForecastOutput { forecast, backtest })
    }
}
