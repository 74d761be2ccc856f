//! Grid queries
//!
//! Sorting, filtering and paging over the records, configured the way the data
//! grid starts out: newest out-of-service dates first, ten rows per page.
//! Rows keep their index into the record list so edits can target them.

use crate::aggregate::parse_service_date;
use crate::records::{Field, RowRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: Field,
    pub direction: SortDirection,
}

/// Per-column filter. `entity_type` is a select filter and matches exactly;
/// every other column matches by substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub field: Field,
    pub value: String,
}

impl ColumnFilter {
    fn matches(&self, record: &RowRecord) -> bool {
        let cell = record.value(self.field).to_lowercase();
        let wanted = self.value.to_lowercase();
        match self.field {
            Field::EntityType => cell == wanted,
            _ => cell.contains(&wanted),
        }
    }
}

/// Sort, filter and page selection for the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridQuery {
    pub sort: Option<SortSpec>,
    pub global_filter: Option<String>,
    pub column_filters: Vec<ColumnFilter>,
    /// Zero-based page index
    pub page: usize,
    pub page_size: usize,
}

impl Default for GridQuery {
    fn default() -> Self {
        Self {
            sort: Some(SortSpec {
                field: Field::OutOfServiceDate,
                direction: SortDirection::Desc,
            }),
            global_filter: None,
            column_filters: Vec::new(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GridQuery {
    /// Read the grid query stored under `"grid"` in the view settings,
    /// falling back to the defaults when absent or unreadable
    pub fn from_settings(settings: &Value) -> Self {
        match settings.get("grid") {
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring unreadable grid settings");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    fn matches(&self, record: &RowRecord) -> bool {
        if let Some(needle) = self.global_filter.as_deref().filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = Field::ALL
                .iter()
                .any(|f| record.value(*f).to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        self.column_filters.iter().all(|f| f.matches(record))
    }
}

/// One page of grid rows
#[derive(Debug)]
pub struct GridPage<'a> {
    /// `(index into records, record)` pairs in display order
    pub rows: Vec<(usize, &'a RowRecord)>,
    /// Rows matching the filters across all pages
    pub total_matches: usize,
    pub page: usize,
    pub page_count: usize,
}

/// Compare two cells of the same column
fn compare_cells(field: Field, a: &RowRecord, b: &RowRecord) -> Ordering {
    match field {
        Field::CreatedDt | Field::OutOfServiceDate => {
            // Unset and unparseable dates order before every real date
            parse_service_date(a.value(field)).cmp(&parse_service_date(b.value(field)))
        }
        Field::UsdotNumber => a.usdot_number().cmp(&b.usdot_number()),
        _ => a
            .value(field)
            .to_lowercase()
            .cmp(&b.value(field).to_lowercase()),
    }
}

/// Apply `query` to `records`
pub fn query_grid<'a>(records: &'a [RowRecord], query: &GridQuery) -> GridPage<'a> {
    let mut rows: Vec<(usize, &RowRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| query.matches(r))
        .collect();

    if let Some(sort) = query.sort {
        rows.sort_by(|(_, a), (_, b)| {
            let ord = compare_cells(sort.field, a, b);
            match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }

    let total_matches = rows.len();
    let page_size = query.page_size.max(1);
    let page_count = total_matches.div_ceil(page_size);
    let start = query.page.saturating_mul(page_size).min(total_matches);
    let end = start.saturating_add(page_size).min(total_matches);

    GridPage {
        rows: rows[start..end].to_vec(),
        total_matches,
        page: query.page,
        page_count,
    }
}
