//! Leakage-free feature generation per series.

pub mod builder;
pub mod calendar;
pub mod window;

pub use builder::FeatureBuilder;
