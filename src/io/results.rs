//! Append-only CSV store for aggregated power records.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::sim::types::{ResultRecord, TIMESTAMP_FORMAT};

/// Column header of the result file. Downstream tools address columns by
/// these names.
pub const HEADER: [&str; 4] = ["timestamp", "meter_power", "pv_power", "sum_power"];

/// Result store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open result store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("result store write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("result store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad result row {row}: {message}")]
    Parse { row: usize, message: String },
}

/// Single-writer CSV sink.
///
/// The header is written together with the first record, so an aborted run
/// that received nothing leaves an empty file. Every append is flushed so a
/// reader sees a valid prefix at any time.
pub struct ResultStore<W: Write> {
    wtr: csv::Writer<W>,
    header_written: bool,
    rows: usize,
}

impl ResultStore<File> {
    /// Creates (or truncates) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let file = File::create(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> ResultStore<W> {
    /// Wraps an empty sink.
    pub fn from_writer(writer: W) -> Self {
        Self {
            wtr: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
            header_written: false,
            rows: 0,
        }
    }

    /// Number of records appended through this handle.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Appends one record, preceded by the header on the first call.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// value, so `sum_power == meter_power - pv_power` holds on the file too.
    pub fn append(&mut self, record: &ResultRecord) -> Result<(), StoreError> {
        if !self.header_written {
            self.wtr.write_record(HEADER)?;
            self.header_written = true;
        }
        self.wtr.write_record([
            record.timestamp_iso(),
            record.meter_power_w.to_string(),
            record.pv_power_w.to_string(),
            record.sum_power_w.to_string(),
        ])?;
        self.wtr.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> Result<W, StoreError> {
        self.wtr
            .into_inner()
            .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))
    }
}

/// Reads a result file back into records.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the header differs from [`HEADER`] or a
/// row does not hold a timestamp and three floats.
pub fn load_records(path: &Path) -> Result<Vec<ResultRecord>, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_records(file)
}

/// Reads records from any CSV source laid out like [`ResultStore`] output.
pub fn read_records(reader: impl io::Read) -> Result<Vec<ResultRecord>, StoreError> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(HEADER) {
        return Err(StoreError::Parse {
            row: 0,
            message: format!("unexpected header {:?}", headers.iter().collect::<Vec<_>>()),
        });
    }

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row?;
        let n = i + 1;
        let float = |col: usize| -> Result<f64, StoreError> {
            row[col].parse().map_err(|e| StoreError::Parse {
                row: n,
                message: format!("column {}: {e}", HEADER[col]),
            })
        };
        let timestamp =
            NaiveDateTime::parse_from_str(&row[0], TIMESTAMP_FORMAT).map_err(|e| {
                StoreError::Parse {
                    row: n,
                    message: format!("column timestamp: {e}"),
                }
            })?;
        records.push(ResultRecord {
            timestamp,
            meter_power_w: float(1)?,
            pv_power_w: float(2)?,
            sum_power_w: float(3)?,
        });
    }
    Ok(records)
}
