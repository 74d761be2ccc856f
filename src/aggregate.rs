//! Aggregation Engine
//!
//! Buckets records by the month of their out-of-service date and counts them.
//!
//! # Rules
//!
//! - Records with an empty or null `out_of_service_date` are skipped
//! - Each remaining date is labelled `Mon YYYY` (e.g. `Mar 2021`)
//! - A date that cannot be parsed is labelled `Invalid Date` and counted
//! - Labels keep first-seen order unless [`LabelOrder::Chronological`] is chosen

use crate::records::{Field, RowRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Label used for dates that do not parse
pub const INVALID_DATE_LABEL: &str = "Invalid Date";

/// Dataset label shown in the chart legend
pub const DATASET_LABEL: &str = "Out of Service by Month";

/// Ordering of chart labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrder {
    /// Order in which each month first appears in the records
    #[default]
    FirstSeen,
    /// Calendar order, with `Invalid Date` last
    Chronological,
}

impl FromStr for LabelOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_seen" | "first-seen" | "firstseen" => Ok(LabelOrder::FirstSeen),
            "chronological" => Ok(LabelOrder::Chronological),
            other => Err(format!("Unknown label order: {}", other)),
        }
    }
}

/// One dataset of the chart, in the bar chart's native shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<u64>,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub border_color: String,
    #[serde(default)]
    pub border_width: u32,
}

/// Month labels with their record counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<ChartDataset>,
}

impl ChartSeries {
    /// Build a single-dataset series from `(label, count)` pairs
    pub fn from_counts(counts: Vec<(String, u64)>) -> Self {
        let (labels, data): (Vec<String>, Vec<u64>) = counts.into_iter().unzip();
        Self {
            labels,
            datasets: vec![ChartDataset {
                label: DATASET_LABEL.to_string(),
                data,
                background_color: "rgba(75, 192, 192, 0.2)".to_string(),
                border_color: "rgba(75, 192, 192, 1)".to_string(),
                border_width: 1,
            }],
        }
    }

    /// `(label, count)` pairs of the first dataset
    pub fn counts(&self) -> Vec<(&str, u64)> {
        let data = self.datasets.first().map(|d| d.data.as_slice()).unwrap_or(&[]);
        self.labels
            .iter()
            .zip(data.iter())
            .map(|(label, count)| (label.as_str(), *count))
            .collect()
    }

    /// Count for one label
    pub fn count_for(&self, label: &str) -> Option<u64> {
        self.counts()
            .into_iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| c)
    }

    /// Sum over all buckets
    pub fn total(&self) -> u64 {
        self.counts().iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Parse an out-of-service date written in any of the forms the dataset and
/// the inline editor produce. Returns `None` when nothing matches.
pub fn parse_service_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let date_formats = [
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%Y/%m/%d",
        "%b %d %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%B %d, %Y",
        "%d %b %Y",
    ];
    for fmt in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    // Keep the calendar date as written, whatever the offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    // Year-month and bare year fall on the first of the month
    if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(&format!("{}-01-01", value), "%Y-%m-%d").ok();
    }
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()
}

/// Month-year label for a raw date value
pub fn month_label(value: &str) -> String {
    match parse_service_date(value) {
        Some(date) => date.format("%b %Y").to_string(),
        None => INVALID_DATE_LABEL.to_string(),
    }
}

/// Derive the chart series from the records
pub fn aggregate(records: &[RowRecord], order: LabelOrder) -> ChartSeries {
    // label -> index into `buckets`
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, Option<(i32, u32)>, u64)> = Vec::new();

    for record in records {
        if record.is_unset(Field::OutOfServiceDate) {
            continue;
        }

        let raw = record.value(Field::OutOfServiceDate);
        let date = parse_service_date(raw);
        let label = match date {
            Some(d) => d.format("%b %Y").to_string(),
            None => INVALID_DATE_LABEL.to_string(),
        };

        match index.get(&label) {
            Some(&i) => buckets[i].2 += 1,
            None => {
                index.insert(label.clone(), buckets.len());
                buckets.push((label, date.map(|d| (d.year(), d.month())), 1));
            }
        }
    }

    if order == LabelOrder::Chronological {
        buckets.sort_by_key(|(_, key, _)| (key.is_none(), *key));
    }

    tracing::debug!(buckets = buckets.len(), ?order, "Chart series aggregated");

    ChartSeries::from_counts(
        buckets
            .into_iter()
            .map(|(label, _, count)| (label, count))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str) -> RowRecord {
        RowRecord::new().with(Field::OutOfServiceDate, date)
    }

    #[test]
    fn test_parse_service_date_formats() {
        let march = NaiveDate::from_ymd_opt(2021, 3, 15).unwrap();

        assert_eq!(parse_service_date("2021-03-15"), Some(march));
        assert_eq!(parse_service_date("03/15/2021"), Some(march));
        assert_eq!(parse_service_date("2021/03/15"), Some(march));
        assert_eq!(parse_service_date("Mar 15 2021"), Some(march));
        assert_eq!(parse_service_date("March 15, 2021"), Some(march));
        assert_eq!(parse_service_date("2021-03-15T08:30"), Some(march));
        assert_eq!(parse_service_date("2021-03-15T23:30:00-05:00"), Some(march));
        assert_eq!(parse_service_date(" 2021-03-15 "), Some(march));
        assert_eq!(parse_service_date("2021-03-15 08:30:00"), Some(march));
        assert_eq!(parse_service_date("2021-03-15 08:30:00.250"), Some(march));

        let first_of_march = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(parse_service_date("2021-03"), Some(first_of_march));
        assert_eq!(
            parse_service_date("2021"),
            NaiveDate::from_ymd_opt(2021, 1, 1)
        );
        assert_eq!(parse_service_date("2021-13"), None);
        assert_eq!(parse_service_date("202"), None);

        assert_eq!(parse_service_date(""), None);
        assert_eq!(parse_service_date("not a date"), None);
        assert_eq!(parse_service_date("2021-13-01"), None);
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label("2021-03-15"), "Mar 2021");
        assert_eq!(month_label("12/01/2019"), "Dec 2019");
        assert_eq!(month_label("garbage"), INVALID_DATE_LABEL);
    }

    #[test]
    fn test_empty_dates_are_skipped() {
        let mut null_date = record("");
        null_date.set_null(Field::OutOfServiceDate);
        let records = vec![record("2021-03-15"), record(""), null_date];

        let series = aggregate(&records, LabelOrder::FirstSeen);
        assert_eq!(series.counts(), vec![("Mar 2021", 1)]);
        assert_eq!(series.total(), 1);
    }

    #[test]
    fn test_first_seen_order_and_counts() {
        let records = vec![
            record("2022-05-02"),
            record("2021-01-20"),
            record("05/30/2022"),
            record("2021-01-03"),
            record("2022-05-11"),
        ];

        let series = aggregate(&records, LabelOrder::FirstSeen);
        assert_eq!(series.counts(), vec![("May 2022", 3), ("Jan 2021", 2)]);
        assert_eq!(series.datasets.len(), 1);
        assert_eq!(series.datasets[0].label, DATASET_LABEL);
    }

    #[test]
    fn test_chronological_order_puts_invalid_last() {
        let records = vec![
            record("bogus"),
            record("2022-05-02"),
            record("2021-11-20"),
            record("2021-02-01"),
        ];

        let series = aggregate(&records, LabelOrder::Chronological);
        assert_eq!(
            series.labels,
            vec!["Feb 2021", "Nov 2021", "May 2022", INVALID_DATE_LABEL]
        );
    }

    #[test]
    fn test_invalid_dates_share_a_bucket() {
        let records = vec![record("soon"), record("2020-02-30"), record("2020-02-29")];

        let series = aggregate(&records, LabelOrder::FirstSeen);
        assert_eq!(series.count_for(INVALID_DATE_LABEL), Some(2));
        assert_eq!(series.count_for("Feb 2020"), Some(1));
        assert_eq!(series.total(), 3);
    }

    #[test]
    fn test_chart_json_shape() {
        let series = aggregate(&[record("2021-03-15")], LabelOrder::FirstSeen);
        let json = serde_json::to_value(&series).unwrap();

        assert_eq!(json["labels"][0], "Mar 2021");
        assert_eq!(json["datasets"][0]["data"][0], 1);
        assert_eq!(json["datasets"][0]["borderWidth"], 1);
        assert!(json["datasets"][0]["backgroundColor"].is_string());
    }

    #[test]
    fn test_label_order_from_str() {
        assert_eq!(
            "chronological".parse::<LabelOrder>().unwrap(),
            LabelOrder::Chronological
        );
        assert_eq!(
            "first-seen".parse::<LabelOrder>().unwrap(),
            LabelOrder::FirstSeen
        );
        assert!("random".parse::<LabelOrder>().is_err());
    }
}
