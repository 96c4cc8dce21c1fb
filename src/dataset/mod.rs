//! Joining panel observations with static and temporal attribute tables.
//!
//! The assembler left-joins optional per-series attributes (by series id) and
//! per-row attributes (by series id + timestamp) onto the observation panel,
//! sanitizes column names, and encodes categorical columns to dictionary
//! codes the model can split on.

use crate::core::Panel;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Characters stripped from input column names. They collide with the
/// model's feature-name constraints downstream.
const STRUCTURAL_CHARS: [char; 6] = ['"', ':', '{', '}', '[', ']'];

/// Internal names of the three key columns every input table is renamed to.
pub const ID_COLUMN: &str = "unique_id";
pub const TIMESTAMP_COLUMN: &str = "ds";
pub const TARGET_COLUMN: &str = "y";

/// Caller-specified names of the key columns in the raw input tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub id: String,
    pub timestamp: String,
    pub target: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            id: ID_COLUMN.to_string(),
            timestamp: TIMESTAMP_COLUMN.to_string(),
            target: TARGET_COLUMN.to_string(),
        }
    }
}

impl ColumnSpec {
    /// Map a raw column name to the internal contract: key columns are
    /// renamed, everything else is sanitized.
    pub fn internal_name(&self, raw: &str) -> String {
        if raw == self.id {
            ID_COLUMN.to_string()
        } else if raw == self.timestamp {
            TIMESTAMP_COLUMN.to_string()
        } else if raw == self.target {
            TARGET_COLUMN.to_string()
        } else {
            sanitize_name(raw)
        }
    }
}

/// Strip structural punctuation from a column name.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !STRUCTURAL_CHARS.contains(c))
        .collect()
}

/// Sanitize a list of column names, rejecting post-sanitization collisions.
pub fn sanitize_names(names: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let clean = sanitize_name(name);
        if !seen.insert(clean.clone()) {
            return Err(ForecastError::ColumnCollision(clean));
        }
        out.push(clean);
    }
    Ok(out)
}

/// A single attribute cell. Non-floating storage classes (`Int`, `Text`) mark
/// the whole column as categorical.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl AttributeValue {
    fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Dictionary key used when the column is categorical.
    fn category_key(&self) -> String {
        match self {
            Self::Float(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            Self::Int(v) => *v as f64,
            Self::Text(_) => f64::NAN,
        }
    }
}

/// Time-invariant attributes, one row per series id.
#[derive(Debug, Clone)]
pub struct StaticTable {
    columns: Vec<String>,
    rows: Vec<(String, Vec<AttributeValue>)>,
}

impl StaticTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add the attribute row for one series. Duplicate ids are a fatal
    /// data-integrity error.
    pub fn push_row(&mut self, id: &str, values: Vec<AttributeValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        if self.rows.iter().any(|(existing, _)| existing == id) {
            return Err(ForecastError::DuplicateKey {
                id: id.to_string(),
                timestamp: "static".to_string(),
            });
        }
        self.rows.push((id.to_string(), values));
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Time-varying attributes, one row per (series id, timestamp). Rows must
/// cover the future horizon for any series whose covariates are needed at
/// prediction time.
#[derive(Debug, Clone)]
pub struct TemporalTable {
    columns: Vec<String>,
    rows: Vec<((String, DateTime<Utc>), Vec<AttributeValue>)>,
    seen: HashSet<(String, DateTime<Utc>)>,
}

impl TemporalTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Add the attribute row for one (series id, timestamp) key.
    pub fn push_row(
        &mut self,
        id: &str,
        timestamp: DateTime<Utc>,
        values: Vec<AttributeValue>,
    ) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        let key = (id.to_string(), timestamp);
        if !self.seen.insert(key.clone()) {
            return Err(ForecastError::DuplicateKey {
                id: id.to_string(),
                timestamp: timestamp.to_rfc3339(),
            });
        }
        self.rows.push((key, values));
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Encoded static attributes keyed by series id.
#[derive(Debug, Clone)]
pub struct EncodedStatic {
    columns: Vec<(String, bool)>,
    values: HashMap<String, Vec<f64>>,
}

impl EncodedStatic {
    /// (sanitized name, categorical) pairs in column order.
    pub fn columns(&self) -> &[(String, bool)] {
        &self.columns
    }

    /// Encoded row for a series id; None falls back to NaN fill (left join).
    pub fn get(&self, id: &str) -> Option<&[f64]> {
        self.values.get(id).map(|v| v.as_slice())
    }
}

/// Encoded temporal attributes keyed by (series id, timestamp).
#[derive(Debug, Clone)]
pub struct EncodedTemporal {
    columns: Vec<(String, bool)>,
    values: HashMap<(String, DateTime<Utc>), Vec<f64>>,
}

impl EncodedTemporal {
    pub fn columns(&self) -> &[(String, bool)] {
        &self.columns
    }

    pub fn get(&self, id: &str, timestamp: DateTime<Utc>) -> Option<&[f64]> {
        self.values
            .get(&(id.to_string(), timestamp))
            .map(|v| v.as_slice())
    }
}

/// The merged dataset: observations plus encoded attribute lookups.
///
/// Source tables are consumed; nothing aliases them afterwards.
#[derive(Debug, Clone)]
pub struct AssembledPanel {
    pub panel: Panel,
    pub static_features: Option<EncodedStatic>,
    pub temporal_features: Option<EncodedTemporal>,
}

/// Merges the observation panel with optional attribute tables.
#[derive(Debug, Clone, Default)]
pub struct DatasetAssembler;

impl DatasetAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Join, sanitize and encode. Missing optional tables skip their join;
    /// the feature set just shrinks.
    pub fn assemble(
        &self,
        panel: Panel,
        static_table: Option<StaticTable>,
        temporal_table: Option<TemporalTable>,
    ) -> Result<AssembledPanel> {
        if panel.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let static_names = match &static_table {
            Some(t) => sanitize_names(t.columns())?,
            None => Vec::new(),
        };
        let temporal_names = match &temporal_table {
            Some(t) => sanitize_names(t.columns())?,
            None => Vec::new(),
        };
        for name in static_names.iter().chain(&temporal_names) {
            if name == ID_COLUMN || name == TIMESTAMP_COLUMN || name == TARGET_COLUMN {
                return Err(ForecastError::InvalidParameter(format!(
                    "attribute column shadows key column {name}"
                )));
            }
            if static_names.iter().filter(|n| *n == name).count()
                + temporal_names.iter().filter(|n| *n == name).count()
                > 1
            {
                return Err(ForecastError::ColumnCollision(name.clone()));
            }
        }

        let static_features = static_table.map(|table| {
            let (columns, encoded) = encode_columns(static_names, &table.rows);
            EncodedStatic {
                columns,
                values: table
                    .rows
                    .iter()
                    .map(|(id, _)| id.clone())
                    .zip(encoded)
                    .collect(),
            }
        });

        let temporal_features = temporal_table.map(|table| {
            let (columns, encoded) = encode_columns(temporal_names, &table.rows);
            EncodedTemporal {
                columns,
                values: table
                    .rows
                    .iter()
                    .map(|(key, _)| key.clone())
                    .zip(encoded)
                    .collect(),
            }
        });

        Ok(AssembledPanel {
            panel,
            static_features,
            temporal_features,
        })
    }
}

/// Encode columns of an attribute table. A column is numeric only when every
/// cell has floating storage class; otherwise it is categorical and cells are
/// mapped to dictionary codes assigned in sorted key order, so the encoding
/// is deterministic for a given table.
fn encode_columns<K>(
    names: Vec<String>,
    rows: &[(K, Vec<AttributeValue>)],
) -> (Vec<(String, bool)>, Vec<Vec<f64>>) {
    let n_cols = names.len();
    let mut categorical = vec![false; n_cols];
    for (_, values) in rows {
        for (j, value) in values.iter().enumerate() {
            if !value.is_float() {
                categorical[j] = true;
            }
        }
    }

    let mut dictionaries: Vec<HashMap<String, f64>> = Vec::with_capacity(n_cols);
    for j in 0..n_cols {
        if categorical[j] {
            let levels: BTreeSet<String> = rows
                .iter()
                .map(|(_, values)| values[j].category_key())
                .collect();
            dictionaries.push(
                levels
                    .into_iter()
                    .enumerate()
                    .map(|(code, key)| (key, code as f64))
                    .collect(),
            );
        } else {
            dictionaries.push(HashMap::new());
        }
    }

    let encoded = rows
        .iter()
        .map(|(_, values)| {
            values
                .iter()
                .enumerate()
                .map(|(j, value)| {
                    if categorical[j] {
                        dictionaries[j][&value.category_key()]
                    } else {
                        value.as_f64()
                    }
                })
                .collect()
        })
        .collect();

    let columns = names.into_iter().zip(categorical).collect();
    (columns, encoded)
}
