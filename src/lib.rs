//! # tsboost
//!
//! Gradient-boosted forecasting for panels of time series.
//!
//! A single shared regression model is trained across all series of a panel
//! (e.g. per-product demand). The pipeline derives leakage-free lag, rolling
//! and calendar features per frequency, runs rolling-origin backtests,
//! fits a gradient-boosted tree ensemble on the pooled feature rows, and
//! assembles multi-horizon forecasts either by recursive model inference or
//! by scoring a tiled seasonal-naive frame.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod backtest;
pub mod core;
pub mod dataset;
pub mod error;
pub mod features;
pub mod forecast;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod report;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::backtest::{BacktestEngine, BacktestReport};
    pub use crate::core::{Panel, PanelBuilder};
    pub use crate::dataset::{AttributeValue, DatasetAssembler, StaticTable, TemporalTable};
    pub use crate::error::{ForecastError, Result};
    pub use crate::forecast::{ForecastRow, ForecastStrategy};
    pub use crate::model::{GbmParams, GbmRegressor};
    pub use crate::pipeline::{ForecastConfig, ForecastOutput, ForecastPipeline};
    pub use crate::profile::{FrequencyCode, FrequencyProfile};
    pub use crate::report::{NullObserver, ProgressObserver};
}
