// Date-keyed record store backed by one CSV file.
// The whole table is read on every load and rewritten on every upsert; there is no
// append path. One process is assumed to be the only writer.

pub mod record;
pub mod table;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::fields::RawValue;

pub use record::{FieldUpdates, Record, Store};

pub const DATE_COLUMN: &str = "date";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed table at line {row}: {reason}")]
    Malformed { row: u64, reason: String },
}

/// Handle to the backing table. Holds no data; every call goes to disk.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record. A missing file is an empty history, not an error.
    pub fn load_all(&self) -> Result<Store, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No table at {}, starting empty", self.path.display());
                return Ok(Store::default());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let store = table::read_table(BufReader::new(file))?;
        debug!("Loaded {} records from {}", store.len(), self.path.display());
        Ok(store)
    }

    /// The record for `date`, if one has been saved.
    pub fn get(&self, date: NaiveDate) -> Result<Option<Record>, StoreError> {
        let mut store = self.load_all()?;
        store.ensure_date_column();
        Ok(store.find(date).cloned())
    }

    /// Merges `updates` into the record for `date`, stamps the current time
    /// and rewrites the table.
    pub fn upsert(
        &self,
        date: NaiveDate,
        updates: &[(String, Option<RawValue>)],
    ) -> Result<Record, StoreError> {
        self.upsert_at(date, updates, Local::now().naive_local())
    }

    pub fn upsert_at(
        &self,
        date: NaiveDate,
        updates: &[(String, Option<RawValue>)],
        now: NaiveDateTime,
    ) -> Result<Record, StoreError> {
        // The table keeps microseconds; the returned record must match what is on disk.
        let now = now.trunc_subsecs(6);
        let mut store = self.load_all()?;
        let record = store.upsert(date, updates, now).clone();
        self.save(&store)?;

        info!(
            "Saved {} field(s) for {date} ({} records total)",
            updates.len(),
            store.len()
        );
        Ok(record)
    }

    /// Writes to a sibling temp file, syncs it, then renames it over the table.
    /// An existing table keeps its permissions.
    fn save(&self, store: &Store) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| self.io_error(source))?;

        let tmp = NamedTempFile::new_in(dir).map_err(|source| self.io_error(source))?;
        table::write_table(store, BufWriter::new(tmp.as_file()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_error(source))?;
        if let Ok(existing) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), existing.permissions())
                .map_err(|source| self.io_error(source))?;
        }
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
