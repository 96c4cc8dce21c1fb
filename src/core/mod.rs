//! Core data structures: the observation panel and the feature frame.

pub mod frame;
pub mod panel;

pub use frame::{FeatureColumn, FeatureFrame};
pub use panel::{Panel, PanelBuilder, SeriesHistory};
