//! Append-only storage for raw sample rows.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;

use super::RawSampleRow;

/// Column order used by CSV exports of the sample log.
pub const CSV_FIELDS: [&str; 5] = ["timestamp", "ssid", "rssi_dbm", "latitude", "longitude"];

/// Errors returned by sample log backends.
#[derive(Debug, Error)]
pub enum SampleLogError {
    #[error("Sample log query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Could not create sample log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV input is missing required column `{0}`")]
    MissingColumn(&'static str),
}

/// Ordered, append-only collection of raw sample rows.
pub trait SampleLog {
    /// Every stored row in insertion order.
    fn read_all(&self) -> Result<Vec<RawSampleRow>, SampleLogError>;
    /// Append one row.
    fn append(&self, row: &RawSampleRow) -> Result<(), SampleLogError>;
}

/// SQLite-backed sample log.
pub struct SqliteSampleLog {
    connection: Connection,
    path: PathBuf,
}

impl SqliteSampleLog {
    /// Open (or create) the sample log database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SampleLogError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SampleLogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let connection = Connection::open(path)?;
        let log = Self {
            connection,
            path: path.to_path_buf(),
        };
        log.apply_schema()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append many rows inside a single transaction.
    pub fn append_batch(&mut self, rows: &[RawSampleRow]) -> Result<usize, SampleLogError> {
        let tx = self.connection.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for row in rows {
                stmt.execute(params![
                    row.timestamp,
                    row.ssid,
                    row.rssi_dbm,
                    row.latitude,
                    row.longitude
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn apply_schema(&self) -> Result<(), SampleLogError> {
        self.connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                ssid TEXT NOT NULL DEFAULT '',
                rssi_dbm TEXT,
                latitude TEXT,
                longitude TEXT
             );",
        )?;
        Ok(())
    }
}

const INSERT_SQL: &str =
    "INSERT INTO samples (timestamp, ssid, rssi_dbm, latitude, longitude) VALUES (?1, ?2, ?3, ?4, ?5)";

impl SampleLog for SqliteSampleLog {
    fn read_all(&self) -> Result<Vec<RawSampleRow>, SampleLogError> {
        let mut stmt = self.connection.prepare(
            "SELECT timestamp, ssid, rssi_dbm, latitude, longitude FROM samples ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawSampleRow {
                    timestamp: row.get(0)?,
                    ssid: row.get(1)?,
                    rssi_dbm: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn append(&self, row: &RawSampleRow) -> Result<(), SampleLogError> {
        let mut stmt = self.connection.prepare_cached(INSERT_SQL)?;
        stmt.execute(params![
            row.timestamp,
            row.ssid,
            row.rssi_dbm,
            row.latitude,
            row.longitude
        ])?;
        Ok(())
    }
}

/// In-memory sample log.
#[derive(Debug, Default)]
pub struct MemorySampleLog {
    rows: Mutex<Vec<RawSampleRow>>,
}

impl MemorySampleLog {
    pub fn new(rows: Vec<RawSampleRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

impl SampleLog for MemorySampleLog {
    fn read_all(&self) -> Result<Vec<RawSampleRow>, SampleLogError> {
        let rows = self.rows.lock().unwrap_or_else(|err| err.into_inner());
        Ok(rows.clone())
    }

    fn append(&self, row: &RawSampleRow) -> Result<(), SampleLogError> {
        self.rows
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(row.clone());
        Ok(())
    }
}

/// Parse a CSV export with a `timestamp,ssid,rssi_dbm,latitude,longitude` header.
///
/// Columns may appear in any order. Empty cells become absent values and
/// double-quoted cells may contain commas.
pub fn import_csv(text: &str) -> Result<Vec<RawSampleRow>, SampleLogError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let header = split_csv_line(header.trim_start_matches('\u{feff}'));
    let mut columns = [0usize; 5];
    for (slot, name) in columns.iter_mut().zip(CSV_FIELDS) {
        *slot = header
            .iter()
            .position(|cell| cell.trim() == name)
            .ok_or(SampleLogError::MissingColumn(name))?;
    }
    let [ts, ssid, rssi, lat, lon] = columns;
    Ok(lines
        .map(|line| {
            let cells = split_csv_line(line);
            let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
            let optional = |idx: usize| Some(cell(idx)).filter(|value| !value.is_empty());
            RawSampleRow {
                timestamp: cell(ts),
                ssid: cell(ssid),
                rssi_dbm: optional(rssi),
                latitude: optional(lat),
                longitude: optional(lon),
            }
        })
        .collect())
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut current)),
            '\r' if !quoted => {}
            _ => current.push(ch),
        }
    }
    cells.push(current);
    cells
}

/// Headline numbers for the sample log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStats {
    /// Number of stored rows, valid or not.
    pub count: usize,
    /// Mean RSSI over rows with a numeric reading, rounded to 0.1 dBm.
    pub avg_rssi: Option<f64>,
    /// RSSI of the most recent row with a numeric reading.
    pub current_signal: Option<f64>,
    /// Timestamp of the most recent row.
    pub last_update: Option<String>,
}

impl LogStats {
    pub fn from_rows(rows: &[RawSampleRow]) -> Self {
        let readings: Vec<f64> = rows.iter().filter_map(RawSampleRow::rssi).collect();
        let avg_rssi = (!readings.is_empty()).then(|| {
            let mean = readings.iter().sum::<f64>() / readings.len() as f64;
            (mean * 10.0).round() / 10.0
        });
        Self {
            count: rows.len(),
            avg_rssi,
            current_signal: readings.last().copied(),
            last_update: rows.last().map(|row| row.timestamp.clone()),
        }
    }
}
