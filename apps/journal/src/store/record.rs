use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::fields::RawValue;
use crate::store::{DATE_COLUMN, TIMESTAMP_COLUMN};

/// Field values to write for one date, in block order. `None` clears the cell.
pub type FieldUpdates = Vec<(String, Option<RawValue>)>;

/// The persisted state of one calendar day.
///
/// Blank cells are simply absent from `fields`; defaults are never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: Option<NaiveDate>,
    pub timestamp: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, RawValue>,
}

impl Record {
    pub fn new(date: NaiveDate, timestamp: NaiveDateTime) -> Self {
        Self {
            date: Some(date),
            timestamp: Some(timestamp),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: Option<RawValue>) {
        match value {
            Some(v) => {
                self.fields.insert(name.to_string(), v);
            }
            None => {
                self.fields.remove(name);
            }
        }
    }
}

/// Every record of the backing table plus its column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Store {
    pub(crate) fn from_parts(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Legacy tables predate the `date` column: derive it from `timestamp`.
    pub fn ensure_date_column(&mut self) {
        if self.has_column(DATE_COLUMN) {
            return;
        }
        for record in &mut self.records {
            if record.date.is_none() {
                record.date = record.timestamp.map(|t| t.date());
            }
        }
        self.columns.push(DATE_COLUMN.to_string());
    }

    /// First record for `date`. There is at most one once every write goes through `upsert`.
    pub fn find(&self, date: NaiveDate) -> Option<&Record> {
        self.records.iter().find(|r| r.date == Some(date))
    }

    /// Inserts a record for `date` or merges `updates` into the existing one.
    ///
    /// Keys not named in `updates` are left alone, so saving one block never
    /// erases another block saved earlier the same day.
    pub fn upsert(
        &mut self,
        date: NaiveDate,
        updates: &[(String, Option<RawValue>)],
        now: NaiveDateTime,
    ) -> &Record {
        self.ensure_date_column();
        self.ensure_column(TIMESTAMP_COLUMN);
        for (name, _) in updates {
            self.ensure_column(name);
        }

        let index = match self.records.iter().position(|r| r.date == Some(date)) {
            Some(index) => {
                self.records[index].timestamp = Some(now);
                index
            }
            None => {
                self.records.push(Record::new(date, now));
                self.records.len() - 1
            }
        };

        let record = &mut self.records[index];
        for (name, value) in updates {
            record.set(name, value.clone());
        }
        record
    }

    /// Records newest first. Rows without a timestamp are skipped.
    pub fn by_timestamp_desc(&self) -> Vec<&Record> {
        let mut rows: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| r.timestamp.is_some())
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }
}
