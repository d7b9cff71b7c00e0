//! CSV encoding of the store.
//!
//! Cells are untyped text on disk. On read a cell becomes a typed scalar only
//! when writing that scalar back reproduces the exact same text, so columns the
//! registry knows nothing about still round-trip byte for byte.

use std::collections::HashSet;
use std::io::{Read, Write};

use chrono::{NaiveDate, NaiveDateTime};

use crate::fields::RawValue;
use crate::store::record::{Record, Store};
use crate::store::{StoreError, DATE_COLUMN, TIMESTAMP_COLUMN};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_READ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub fn read_table<R: Read>(reader: R) -> Result<Store, StoreError> {
    let mut table = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let columns: Vec<String> = table.headers()?.iter().map(str::to_string).collect();
    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(StoreError::Malformed {
            row: 1,
            reason: format!("column '{dup}' appears more than once"),
        });
    }

    let mut records = Vec::new();
    for row in table.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let mut record = Record {
            date: None,
            timestamp: None,
            fields: Default::default(),
        };

        for (column, cell) in columns.iter().zip(row.iter()) {
            match column.as_str() {
                DATE_COLUMN if !cell.is_empty() => {
                    let date = NaiveDate::parse_from_str(cell, DATE_FORMAT).map_err(|_| {
                        StoreError::Malformed {
                            row: line,
                            reason: format!("'{cell}' is not a YYYY-MM-DD date"),
                        }
                    })?;
                    record.date = Some(date);
                }
                TIMESTAMP_COLUMN if !cell.is_empty() => {
                    let ts = parse_timestamp(cell).ok_or_else(|| StoreError::Malformed {
                        row: line,
                        reason: format!("'{cell}' is not a timestamp"),
                    })?;
                    record.timestamp = Some(ts);
                }
                DATE_COLUMN | TIMESTAMP_COLUMN => {}
                name => {
                    if let Some(value) = parse_cell(cell) {
                        record.fields.insert(name.to_string(), value);
                    }
                }
            }
        }
        records.push(record);
    }

    Ok(Store::from_parts(columns, records))
}

pub fn write_table<W: Write>(store: &Store, writer: W) -> Result<(), StoreError> {
    let mut table = csv::Writer::from_writer(writer);
    table.write_record(store.columns())?;

    for record in store.records() {
        let row = store.columns().iter().map(|column| match column.as_str() {
            DATE_COLUMN => record
                .date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            TIMESTAMP_COLUMN => record
                .timestamp
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            name => record.get(name).map(ToString::to_string).unwrap_or_default(),
        });
        table.write_record(row)?;
    }

    table.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Accepts the written format, without or with fractional seconds, a `T`
/// separator, or a bare date.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_READ_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_cell(cell: &str) -> Option<RawValue> {
    if cell.is_empty() {
        return None;
    }
    let candidate = match cell {
        "True" => RawValue::Bool(true),
        "False" => RawValue::Bool(false),
        _ => {
            if let Ok(i) = cell.parse::<i64>() {
                RawValue::Int(i)
            } else if let Ok(f) = cell.parse::<f64>() {
                RawValue::Float(f)
            } else {
                return Some(RawValue::Text(cell.to_string()));
            }
        }
    };
    if candidate.to_string() == cell {
        Some(candidate)
    } else {
        Some(RawValue::Text(cell.to_string()))
    }
}
