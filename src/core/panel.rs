//! Panel of independent time series sharing one frequency.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One series of the panel: ordered (timestamp, target) observations.
#[derive(Debug, Clone)]
pub struct SeriesHistory {
    id: String,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl SeriesHistory {
    /// Series identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Ordered observation timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Target values aligned with `timestamps`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Last observation timestamp, if any.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// Copy of the first `len` observations.
    pub fn head(&self, len: usize) -> SeriesHistory {
        let len = len.min(self.len());
        SeriesHistory {
            id: self.id.clone(),
            timestamps: self.timestamps[..len].to_vec(),
            values: self.values[..len].to_vec(),
        }
    }
}

/// Collection of series processed together by one shared model.
///
/// Series are kept in ascending id order so that every derived artifact
/// (feature frames, forecasts, backtest tables) has a deterministic row order.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    series: Vec<SeriesHistory>,
}

impl Panel {
    /// Number of series in the panel.
    pub fn n_series(&self) -> usize {
        self.series.len()
    }

    /// Total number of observations across all series.
    pub fn n_rows(&self) -> usize {
        self.series.iter().map(|s| s.len()).sum()
    }

    /// Check if the panel holds no series.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Series in ascending id order.
    pub fn series(&self) -> &[SeriesHistory] {
        &self.series
    }

    /// Look up a series by id.
    pub fn get(&self, id: &str) -> Option<&SeriesHistory> {
        self.series
            .binary_search_by(|s| s.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.series[i])
    }

    /// Panel with each series truncated to its first `keep(series)` rows.
    ///
    /// Series truncated to zero rows are removed. Used by the backtest engine
    /// to freeze per-window training cuts.
    pub fn truncated<F>(&self, keep: F) -> Panel
    where
        F: Fn(&SeriesHistory) -> usize,
    {
        let series = self
            .series
            .iter()
            .map(|s| s.head(keep(s)))
            .filter(|s| !s.is_empty())
            .collect();
        Panel { series }
    }
}

/// Builder accumulating (series id, timestamp, target) rows.
///
/// Rows may arrive in any order; `build` sorts each series by timestamp and
/// rejects duplicate (series id, timestamp) keys, which have no defined
/// tie-break policy.
#[derive(Debug, Clone, Default)]
pub struct PanelBuilder {
    rows: HashMap<String, Vec<(DateTime<Utc>, f64)>>,
}

impl PanelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn push(&mut self, id: &str, timestamp: DateTime<Utc>, value: f64) {
        self.rows
            .entry(id.to_string())
            .or_default()
            .push((timestamp, value));
    }

    /// Sort, validate and freeze the panel.
    pub fn build(self) -> Result<Panel> {
        if self.rows.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let mut series = Vec::with_capacity(self.rows.len());
        for (id, mut obs) in self.rows {
            obs.sort_by_key(|(ts, _)| *ts);
            for pair in obs.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(ForecastError::DuplicateKey {
                        id,
                        timestamp: pair[0].0.to_rfc3339(),
                    });
                }
            }
            let (timestamps, values) = obs.into_iter().unzip();
            series.push(SeriesHistory {
                id,
                timestamps,
                values,
            });
        }
        series.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Panel { series })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    #[test]
    fn panel_builder_sorts_series_and_observations() {
        let mut builder = PanelBuilder::new();
        builder.push("b", day(1), 2.0);
        builder.push("a", day(0), 10.0);
        builder.push("b", day(0), 1.0);

        let panel = builder.build().unwrap();
        assert_eq!(panel.n_series(), 2);
        assert_eq!(panel.n_rows(), 3);
        assert_eq!(panel.series()[0].id(), "a");
        assert_eq!(panel.series()[1].id(), "b");
        assert_eq!(panel.get("b").unwrap().values(), &[1.0, 2.0]);
    }

    #[test]
    fn panel_builder_rejects_duplicate_keys() {
        let mut builder = PanelBuilder::new();
        builder.push("a", day(0), 1.0);
        builder.push("a", day(0), 2.0);

        assert!(matches!(
            builder.build(),
            Err(ForecastError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn panel_builder_rejects_empty_input() {
        assert!(matches!(
            PanelBuilder::new().build(),
            Err(ForecastError::EmptyData)
        ));
    }

    #[test]
    fn truncated_drops_emptied_series() {
        let mut builder = PanelBuilder::new();
        for i in 0..5 {
            builder.push("long", day(i), i as f64);
        }
        builder.push("short", day(0), 1.0);
        let panel = builder.build().unwrap();

        let cut = panel.truncated(|s| s.len().saturating_sub(2));
        assert_eq!(cut.get("long").unwrap().len(), 3);
        assert!(cut.get("short").is_none());
    }

    #[test]
    fn series_head_is_a_prefix() {
        let mut builder = PanelBuilder::new();
        for i in 0..4 {
            builder.push("a", day(i), i as f64);
        }
        let panel = builder.build().unwrap();
        let head = panel.get("a").unwrap().head(2);
        assert_eq!(head.values(), &[0.0, 1.0]);
        assert_eq!(head.last_timestamp(), Some(day(1)));
    }
}
