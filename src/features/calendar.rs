//! Calendar components derived deterministically from row timestamps.

use crate::profile::DateFeature;
use chrono::{DateTime, Datelike, Utc};

/// Extract one calendar feature from a timestamp.
pub fn extract(feature: DateFeature, timestamp: DateTime<Utc>) -> f64 {
    match feature {
        DateFeature::Year => timestamp.year() as f64,
        DateFeature::Quarter => ((timestamp.month() - 1) / 3 + 1) as f64,
        DateFeature::Month => timestamp.month() as f64,
        DateFeature::Week => timestamp.iso_week().week() as f64,
        DateFeature::Day => timestamp.day() as f64,
        DateFeature::DayOfWeek => timestamp.weekday().num_days_from_monday() as f64,
    }
}
