//! Row-aligned feature table produced by feature generation.
//!
//! One row per (series id, timestamp) carrying the target and all derived
//! feature columns. Rows belonging to the same series are contiguous and
//! ordered by timestamp; series appear in ascending id order.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use ndarray::Array2;

/// A named feature column with a categorical marker.
///
/// Categorical columns hold dictionary codes stored as `f64`; the marker tells
/// the downstream model to split them by equality rather than by threshold.
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    pub name: String,
    pub categorical: bool,
    pub values: Vec<f64>,
}

/// Feature rows keyed by (series id, timestamp).
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    ids: Vec<String>,
    timestamps: Vec<DateTime<Utc>>,
    targets: Vec<f64>,
    columns: Vec<FeatureColumn>,
}

impl FeatureFrame {
    /// Create an empty frame with the given (name, categorical) schema.
    pub fn new(schema: &[(String, bool)]) -> Self {
        Self {
            ids: Vec::new(),
            timestamps: Vec::new(),
            targets: Vec::new(),
            columns: schema
                .iter()
                .map(|(name, categorical)| FeatureColumn {
                    name: name.clone(),
                    categorical: *categorical,
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Row series ids.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Row timestamps.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Row target values (NaN for synthetic future rows).
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Feature columns in schema order.
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// (name, categorical) pairs in schema order.
    pub fn schema(&self) -> Vec<(String, bool)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.categorical))
            .collect()
    }

    /// Categorical markers in schema order.
    pub fn categorical_flags(&self) -> Vec<bool> {
        self.columns.iter().map(|c| c.categorical).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&FeatureColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
    }

    /// Replace the values of an existing column.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))?;
        column.values = values;
        Ok(())
    }

    /// Append one row. Feature values must match the schema length.
    pub fn push_row(
        &mut self,
        id: &str,
        timestamp: DateTime<Utc>,
        target: f64,
        features: &[f64],
    ) -> Result<()> {
        if features.len() != self.columns.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.columns.len(),
                got: features.len(),
            });
        }
        self.ids.push(id.to_string());
        self.timestamps.push(timestamp);
        self.targets.push(target);
        for (column, &value) in self.columns.iter_mut().zip(features) {
            column.values.push(value);
        }
        Ok(())
    }

    /// Append all rows of another frame with an identical schema.
    pub fn append(&mut self, other: &FeatureFrame) -> Result<()> {
        if self.schema() != other.schema() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.columns.len(),
                got: other.columns.len(),
            });
        }
        self.ids.extend_from_slice(&other.ids);
        self.timestamps.extend_from_slice(&other.timestamps);
        self.targets.extend_from_slice(&other.targets);
        for (dst, src) in self.columns.iter_mut().zip(&other.columns) {
            dst.values.extend_from_slice(&src.values);
        }
        Ok(())
    }

    /// Keep only rows where `keep[row]` is true.
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.len());
        let mut iter = keep.iter();
        self.ids.retain(|_| *iter.next().unwrap());
        let mut iter = keep.iter();
        self.timestamps.retain(|_| *iter.next().unwrap());
        let mut iter = keep.iter();
        self.targets.retain(|_| *iter.next().unwrap());
        for column in &mut self.columns {
            let mut iter = keep.iter();
            column.values.retain(|_| *iter.next().unwrap());
        }
    }

    /// Restore the (series id, timestamp) row order after concatenation.
    pub fn sort_rows(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.ids[a]
                .cmp(&self.ids[b])
                .then(self.timestamps[a].cmp(&self.timestamps[b]))
        });

        self.ids = order.iter().map(|&i| self.ids[i].clone()).collect();
        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        self.targets = order.iter().map(|&i| self.targets[i]).collect();
        for column in &mut self.columns {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    /// Contiguous (start, end) row ranges per series, in row order.
    pub fn series_ranges(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for i in 1..=self.len() {
            if i == self.len() || self.ids[i] != self.ids[start] {
                ranges.push((start, i));
                start = i;
            }
        }
        ranges
    }

    /// Frame with the first `n` rows of each series.
    pub fn head_per_series(&self, n: usize) -> FeatureFrame {
        self.take_per_series(n, true)
    }

    /// Frame with the last `n` rows of each series.
    pub fn tail_per_series(&self, n: usize) -> FeatureFrame {
        self.take_per_series(n, false)
    }

    fn take_per_series(&self, n: usize, from_start: bool) -> FeatureFrame {
        let mut out = FeatureFrame::new(&self.schema());
        for (start, end) in self.series_ranges() {
            let len = (end - start).min(n);
            let range = if from_start {
                start..start + len
            } else {
                end - len..end
            };
            for i in range {
                let features: Vec<f64> = self.columns.iter().map(|c| c.values[i]).collect();
                out.push_row(&self.ids[i], self.timestamps[i], self.targets[i], &features)
                    .expect("schema matches by construction");
            }
        }
        out
    }

    /// Shift every row timestamp by `delta`.
    pub fn shift_timestamps(&mut self, delta: Duration) {
        for ts in &mut self.timestamps {
            *ts += delta;
        }
    }

    /// Feature values of one row, in schema order.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c.values[index]).collect()
    }

    /// Design matrix (rows x features) for the model.
    pub fn to_matrix(&self) -> Array2<f64> {
        let n = self.len();
        let m = self.columns.len();
        let mut matrix = Array2::zeros((n, m));
        for (j, column) in self.columns.iter().enumerate() {
            for (i, &value) in column.values.iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn schema() -> Vec<(String, bool)> {
        vec![("lag1".to_string(), false), ("store".to_string(), true)]
    }

    fn sample_frame() -> FeatureFrame {
        let mut frame = FeatureFrame::new(&schema());
        frame.push_row("a", day(0), 1.0, &[10.0, 0.0]).unwrap();
        frame.push_row("a", day(1), 2.0, &[11.0, 0.0]).unwrap();
        frame.push_row("b", day(0), 3.0, &[12.0, 1.0]).unwrap();
        frame
    }

    #[test]
    fn push_row_validates_feature_count() {
        let mut frame = FeatureFrame::new(&schema());
        assert!(matches!(
            frame.push_row("a", day(0), 1.0, &[1.0]),
            Err(ForecastError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn retain_filters_all_vectors() {
        let mut frame = sample_frame();
        frame.retain(&[true, false, true]);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.ids(), &["a", "b"]);
        assert_eq!(frame.targets(), &[1.0, 3.0]);
        assert_eq!(frame.column("lag1").unwrap().values, &[10.0, 12.0]);
    }

    #[test]
    fn sort_rows_orders_by_id_then_timestamp() {
        let mut frame = FeatureFrame::new(&schema());
        frame.push_row("b", day(1), 4.0, &[1.0, 1.0]).unwrap();
        frame.push_row("a", day(1), 2.0, &[2.0, 0.0]).unwrap();
        frame.push_row("b", day(0), 3.0, &[3.0, 1.0]).unwrap();
        frame.push_row("a", day(0), 1.0, &[4.0, 0.0]).unwrap();

        frame.sort_rows();
        assert_eq!(frame.ids(), &["a", "a", "b", "b"]);
        assert_eq!(frame.targets(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frame.series_ranges(), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn tail_per_series_takes_last_rows() {
        let frame = sample_frame();
        let tail = frame.tail_per_series(1);

        assert_eq!(tail.len(), 2);
        assert_eq!(tail.ids(), &["a", "b"]);
        assert_eq!(tail.targets(), &[2.0, 3.0]);
    }

    #[test]
    fn head_per_series_caps_at_series_length() {
        let frame = sample_frame();
        let head = frame.head_per_series(5);
        assert_eq!(head.len(), 3);
    }

    #[test]
    fn to_matrix_is_row_major_by_schema() {
        let frame = sample_frame();
        let matrix = frame.to_matrix();
        assert_eq!(matrix.shape(), &[3, 2]);
        assert_eq!(matrix[[1, 0]], 11.0);
        assert_eq!(matrix[[2, 1]], 1.0);
    }

    #[test]
    fn append_requires_identical_schema() {
        let mut frame = sample_frame();
        let other = FeatureFrame::new(&[("lag1".to_string(), false)]);
        assert!(frame.append(&other).is_err());

        let mut extra = FeatureFrame::new(&schema());
        extra.push_row("c", day(0), 9.0, &[1.0, 2.0]).unwrap();
        frame.append(&extra).unwrap();
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn shift_timestamps_moves_all_rows() {
        let mut frame = sample_frame();
        frame.shift_timestamps(Duration::days(7));
        assert_eq!(frame.timestamps()[0], day(7));
        assert_eq!(frame.timestamps()[2], day(7));
    }
}
