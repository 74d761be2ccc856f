//! Row records
//!
//! One record per CSV data line, keyed by the fixed carrier field set.
//! Every value is kept as text; conversions happen where values are used.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The fixed columns of the carrier dataset, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CreatedDt,
    EntityType,
    OperatingStatus,
    LegalName,
    OutOfServiceDate,
    UsdotNumber,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::CreatedDt,
        Field::EntityType,
        Field::OperatingStatus,
        Field::LegalName,
        Field::OutOfServiceDate,
        Field::UsdotNumber,
    ];

    /// Column name as it appears in the CSV header and snapshot JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CreatedDt => "created_dt",
            Field::EntityType => "entity_type",
            Field::OperatingStatus => "operating_status",
            Field::LegalName => "legal_name",
            Field::OutOfServiceDate => "out_of_service_date",
            Field::UsdotNumber => "usdot_number",
        }
    }

    /// Human-readable column header
    pub fn header(&self) -> &'static str {
        match self {
            Field::CreatedDt => "Created Date",
            Field::EntityType => "Entity Type",
            Field::OperatingStatus => "Operating Status",
            Field::LegalName => "Legal Name",
            Field::OutOfServiceDate => "Out of Service Date",
            Field::UsdotNumber => "USDOT Number",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// A single carrier row. `None` is a null value; `Some("")` is "not set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    values: [Option<String>; 6],
}

impl RowRecord {
    /// Create a record with every field set to the empty string
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| Some(String::new())),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Raw value, `None` when null
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    /// Value with null folded into the empty string
    pub fn value(&self, field: Field) -> &str {
        self.get(field).unwrap_or("")
    }

    /// True when the field is null or empty
    pub fn is_unset(&self, field: Field) -> bool {
        self.value(field).is_empty()
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = Some(value.into());
    }

    pub fn set_null(&mut self, field: Field) {
        self.values[field.index()] = None;
    }

    /// USDOT number parsed at the point of use
    pub fn usdot_number(&self) -> Option<u64> {
        self.value(Field::UsdotNumber).trim().parse().ok()
    }
}

impl Default for RowRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Field::ALL.len()))?;
        for field in Field::ALL {
            map.serialize_entry(field.as_str(), &self.get(field))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: HashMap<String, serde_json::Value> = HashMap::deserialize(deserializer)?;
        let mut record = RowRecord::new();

        for field in Field::ALL {
            match raw.get(field.as_str()) {
                Some(serde_json::Value::Null) => record.set_null(field),
                Some(serde_json::Value::String(s)) => record.set(field, s.clone()),
                // Numbers and booleans are kept as their text form
                Some(other) => record.set(field, other.to_string()),
                None => {}
            }
        }

        Ok(record)
    }
}
