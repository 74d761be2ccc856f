//! Header-row CSV parsing into row records

use super::LoadError;
use crate::records::{Field, RowRecord};

/// Parsed records plus how much repair the input needed
#[derive(Debug)]
pub struct ParseOutcome {
    pub records: Vec<RowRecord>,
    /// Rows whose column count did not match the header
    pub repaired_rows: usize,
    /// Rows the CSV reader could not decode at all
    pub skipped_rows: usize,
}

/// Parse CSV text using the first line as the header.
///
/// Values are aligned by header position. Columns outside the fixed field set
/// are ignored; fields absent from the header, or cut off by a short row, are
/// left as empty strings.
pub fn parse_csv(text: &str) -> Result<ParseOutcome, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LoadError::Header(e.to_string()))?
        .clone();

    let positions: Vec<(Field, Option<usize>)> = Field::ALL
        .iter()
        .map(|field| {
            let pos = headers.iter().position(|h| h.trim() == field.as_str());
            (*field, pos)
        })
        .collect();

    for (field, pos) in &positions {
        if pos.is_none() {
            tracing::warn!(field = %field, "CSV header is missing a column");
        }
    }

    let mut records = Vec::new();
    let mut repaired_rows = 0;
    let mut skipped_rows = 0;

    for (line_num, result) in reader.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(line = line_num + 2, error = %e, "Skipping unreadable row");
                skipped_rows += 1;
                continue;
            }
        };

        if row.len() != headers.len() {
            repaired_rows += 1;
        }

        let mut record = RowRecord::new();
        for (field, pos) in &positions {
            if let Some(value) = pos.and_then(|p| row.get(p)) {
                record.set(*field, value);
            }
        }
        records.push(record);
    }

    Ok(ParseOutcome {
        records,
        repaired_rows,
        skipped_rows,
    })
}
