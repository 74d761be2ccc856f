//! Pivot cross-tabulation
//!
//! Counts records by the values of the chosen row fields against the values of
//! the chosen column fields. Row and column keys are sorted ascending; the
//! pivot axes are kept in the view settings under `"pivot"`.

use crate::aggregate::ChartSeries;
use crate::records::{Field, RowRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Chosen pivot axes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotConfig {
    #[serde(default)]
    pub rows: Vec<Field>,
    #[serde(default)]
    pub cols: Vec<Field>,
}

impl PivotConfig {
    pub fn new(rows: Vec<Field>, cols: Vec<Field>) -> Self {
        Self { rows, cols }
    }

    /// Axes stored under `"pivot"` in the view settings
    pub fn from_settings(settings: &Value) -> Option<Self> {
        let raw = settings.get("pivot")?;
        match serde_json::from_value(raw.clone()) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable pivot settings");
                None
            }
        }
    }

    /// Copy of `settings` with these axes stored under `"pivot"`
    pub fn store_in(&self, settings: &Value) -> Value {
        let mut map = settings.as_object().cloned().unwrap_or_default();
        map.insert(
            "pivot".to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }
}

/// Tuple of field values identifying one pivot row or column
pub type PivotKey = Vec<String>;

/// Result of a pivot: counts per (row key, column key) with totals
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub config: PivotConfig,
    pub row_keys: Vec<PivotKey>,
    pub col_keys: Vec<PivotKey>,
    cells: BTreeMap<(PivotKey, PivotKey), u64>,
    row_totals: BTreeMap<PivotKey, u64>,
    col_totals: BTreeMap<PivotKey, u64>,
    pub grand_total: u64,
}

impl PivotTable {
    /// Count for one cell; zero for combinations that never occur
    pub fn count(&self, row: &[String], col: &[String]) -> u64 {
        self.cells
            .get(&(row.to_vec(), col.to_vec()))
            .copied()
            .unwrap_or(0)
    }

    pub fn row_total(&self, row: &[String]) -> u64 {
        self.row_totals.get(row).copied().unwrap_or(0)
    }

    pub fn col_total(&self, col: &[String]) -> u64 {
        self.col_totals.get(col).copied().unwrap_or(0)
    }

    /// Row totals as a bar chart series
    pub fn to_chart(&self) -> ChartSeries {
        let counts = self
            .row_keys
            .iter()
            .map(|key| (display_key(key), self.row_total(key)))
            .collect();

        let mut series = ChartSeries::from_counts(counts);
        if let Some(dataset) = series.datasets.first_mut() {
            dataset.label = "Pivot Chart".to_string();
            dataset.background_color = "rgba(153, 102, 255, 0.2)".to_string();
            dataset.border_color = "rgba(153, 102, 255, 1)".to_string();
        }
        series
    }
}

/// Join key parts for display; empty parts read as `(blank)`
pub fn display_key(key: &[String]) -> String {
    if key.is_empty() {
        return "Totals".to_string();
    }
    key.iter()
        .map(|part| if part.is_empty() { "(blank)" } else { part.as_str() })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn key_for(record: &RowRecord, fields: &[Field]) -> PivotKey {
    fields
        .iter()
        .map(|f| record.value(*f).to_string())
        .collect()
}

/// Cross-tabulate `records` by record count
pub fn pivot(records: &[RowRecord], config: &PivotConfig) -> PivotTable {
    let mut cells: BTreeMap<(PivotKey, PivotKey), u64> = BTreeMap::new();
    let mut row_totals: BTreeMap<PivotKey, u64> = BTreeMap::new();
    let mut col_totals: BTreeMap<PivotKey, u64> = BTreeMap::new();
    let mut row_keys = BTreeSet::new();
    let mut col_keys = BTreeSet::new();

    for record in records {
        let row = key_for(record, &config.rows);
        let col = key_for(record, &config.cols);

        *cells.entry((row.clone(), col.clone())).or_insert(0) += 1;
        *row_totals.entry(row.clone()).or_insert(0) += 1;
        *col_totals.entry(col.clone()).or_insert(0) += 1;
        row_keys.insert(row);
        col_keys.insert(col);
    }

    tracing::debug!(
        rows = row_keys.len(),
        cols = col_keys.len(),
        "Pivot computed"
    );

    PivotTable {
        config: config.clone(),
        row_keys: row_keys.into_iter().collect(),
        col_keys: col_keys.into_iter().collect(),
        cells,
        row_totals,
        col_totals,
        grand_total: records.len() as u64,
    }
}
