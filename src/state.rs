//! View State Store
//!
//! Holds the records, the chart series derived from them, and the free-form
//! view settings. Every record mutation re-derives the chart series before
//! returning, so readers never observe a stale chart.

use crate::aggregate::{aggregate, ChartSeries, LabelOrder};
use crate::records::{Field, RowRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serializable state: the snapshot persisted to storage and share links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(alias = "tableData")]
    pub records: Vec<RowRecord>,

    #[serde(rename = "chartSeries", alias = "chartData", default)]
    pub chart_series: ChartSeries,

    #[serde(alias = "viewSettings", default = "empty_settings")]
    pub settings: Value,
}

fn empty_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            chart_series: ChartSeries::default(),
            settings: empty_settings(),
        }
    }
}

/// Single owner of the current view state
#[derive(Debug, Clone)]
pub struct ViewStateStore {
    state: ViewState,
    order: LabelOrder,
}

impl ViewStateStore {
    /// Empty store
    pub fn new(order: LabelOrder) -> Self {
        let mut store = Self {
            state: ViewState::default(),
            order,
        };
        store.refresh_chart();
        store
    }

    /// Store seeded with freshly loaded records
    pub fn with_records(records: Vec<RowRecord>, order: LabelOrder) -> Self {
        let mut store = Self::new(order);
        store.set_records(records);
        store
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn records(&self) -> &[RowRecord] {
        &self.state.records
    }

    pub fn chart_series(&self) -> &ChartSeries {
        &self.state.chart_series
    }

    pub fn settings(&self) -> &Value {
        &self.state.settings
    }

    pub fn label_order(&self) -> LabelOrder {
        self.order
    }

    /// Change label ordering and re-derive the chart
    pub fn set_label_order(&mut self, order: LabelOrder) {
        self.order = order;
        self.refresh_chart();
    }

    /// Replace all records and re-derive the chart
    pub fn set_records(&mut self, records: Vec<RowRecord>) {
        self.state.records = records;
        self.refresh_chart();
    }

    /// Set one field of one record.
    ///
    /// Returns `false` without touching anything when `row_index` is out of
    /// range or `field_name` is not one of the fixed fields.
    pub fn edit_field(&mut self, row_index: usize, field_name: &str, value: &str) -> bool {
        let field: Field = match field_name.parse() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring edit of unknown field");
                return false;
            }
        };

        let rows = self.state.records.len();
        let Some(record) = self.state.records.get_mut(row_index) else {
            tracing::warn!(row_index, rows, "Ignoring edit of out-of-range row");
            return false;
        };

        record.set(field, value);
        tracing::debug!(row_index, field = %field, value, "Record field edited");

        self.refresh_chart();
        true
    }

    /// Set a record's out-of-service date in the `MM/DD/YYYY` form the date
    /// picker writes back
    pub fn edit_out_of_service_date(&mut self, row_index: usize, date: NaiveDate) -> bool {
        let formatted = date.format("%m/%d/%Y").to_string();
        self.edit_field(row_index, Field::OutOfServiceDate.as_str(), &formatted)
    }

    /// Replace the view settings wholesale
    pub fn set_settings(&mut self, settings: Value) {
        self.state.settings = settings;
    }

    /// Copy of the current state for persistence or sharing
    pub fn snapshot(&self) -> ViewState {
        self.state.clone()
    }

    /// Adopt a persisted or shared state.
    ///
    /// The chart series is re-derived from the records; a stored chart that
    /// disagrees is replaced.
    pub fn restore(&mut self, snapshot: ViewState) {
        let stored_chart = snapshot.chart_series;
        self.state.records = snapshot.records;
        self.state.settings = snapshot.settings;
        self.refresh_chart();

        if stored_chart != self.state.chart_series {
            tracing::warn!("Stored chart series did not match its records; re-derived");
        }
    }

    fn refresh_chart(&mut self) {
        self.state.chart_series = aggregate(&self.state.records, self.order);
    }
}
