//! CSV-backed record store.
//!
//! The store owns the backing file and a single-slot load cache. Loads are
//! served from the cache until a successful [`RecordStore::append`] (or an
//! explicit [`RecordStore::invalidate`]) marks it stale.
//!
//! There is no locking: two processes appending at once can interleave rows.

pub mod csv;
mod fallback;

pub use fallback::fallback_table;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{validate_required, Column, Dataset, TreatmentRecord, ValidationError};
use crate::schema::{normalize, RawTable, RowDefaults};

/// Append errors. Each variant maps to a distinct message for the user.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Store file is busy or open in another program: {}", path.display())]
    Locked { path: PathBuf, source: io::Error },

    #[error("Could not write {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Unexpected failure writing {}: {detail}", path.display())]
    Unexpected { path: PathBuf, detail: String },
}

impl StoreError {
    /// Whether the user can fix the condition elsewhere and retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }

    /// Sort an I/O failure into locked, OS-reported, or unexpected.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        if is_lock_error(&err) {
            StoreError::Locked { path, source: err }
        } else if err.raw_os_error().is_some() {
            StoreError::Io { path, source: err }
        } else {
            StoreError::Unexpected {
                path,
                detail: err.to_string(),
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Windows reports a file held open by another program as a sharing or lock
/// violation (OS errors 32 and 33), surfaced by std as `PermissionDenied`.
fn is_lock_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    cfg!(windows)
        && (matches!(err.raw_os_error(), Some(32) | Some(33))
            || err.kind() == io::ErrorKind::PermissionDenied)
}

/// Why a load fell back to the built-in records.
#[derive(Error, Debug)]
pub enum LoadFailure {
    #[error("could not read store: {0}")]
    Read(#[from] io::Error),

    #[error("store is not valid UTF-8")]
    Encoding,

    #[error("store is not valid CSV: {0}")]
    Parse(#[from] csv::CsvError),
}

/// Where a snapshot's records came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// Read from the backing file
    File,
    /// Backing file missing or unreadable; built-in sample records
    Fallback { reason: String },
}

impl DataSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DataSource::Fallback { .. })
    }
}

/// Immutable view handed out by [`RecordStore::load`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Arc<Dataset>,
    pub source: DataSource,
    /// Cells filled with defaults during normalization
    pub defaulted: Arc<[RowDefaults]>,
}

/// Single-slot cache of the last load.
#[derive(Debug, Default)]
pub struct LoadCache {
    snapshot: Option<Snapshot>,
    stale: bool,
}

impl LoadCache {
    /// Cached snapshot, unless stale or never filled.
    pub fn get(&self) -> Option<&Snapshot> {
        if self.stale {
            None
        } else {
            self.snapshot.as_ref()
        }
    }

    pub fn put(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
        self.stale = false;
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// True when the next load will re-read the store.
    pub fn is_stale(&self) -> bool {
        self.stale || self.snapshot.is_none()
    }
}

/// CSV file of treatment records plus its load cache.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    cache: LoadCache,
}

impl RecordStore {
    /// Store backed by `path`. Nothing is read until [`RecordStore::load`].
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: LoadCache::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn cache(&self) -> &LoadCache {
        &self.cache
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale()
    }

    /// Load the dataset, from cache when fresh.
    ///
    /// Never fails: an unreadable store yields the fallback records, reported
    /// through [`Snapshot::source`].
    pub fn load(&mut self) -> Snapshot {
        if let Some(snapshot) = self.cache.get() {
            debug!(path = %self.path.display(), "serving cached snapshot");
            return snapshot.clone();
        }

        let (table, source) = match self.read_table() {
            Ok(table) => (table, DataSource::File),
            Err(failure) => {
                warn!(
                    path = %self.path.display(),
                    reason = %failure,
                    "using built-in sample records"
                );
                let today = chrono::Local::now().date_naive();
                (
                    fallback_table(today),
                    DataSource::Fallback {
                        reason: failure.to_string(),
                    },
                )
            }
        };

        let normalized = normalize(&table);
        if !normalized.is_clean() {
            debug!(
                rows = normalized.defaulted.len(),
                "filled defaults during normalization"
            );
        }
        debug!(
            path = %self.path.display(),
            records = normalized.dataset.len(),
            "loaded dataset"
        );

        let snapshot = Snapshot {
            dataset: Arc::new(normalized.dataset),
            source,
            defaulted: normalized.defaulted.into(),
        };
        self.cache.put(snapshot.clone());
        snapshot
    }

    fn read_table(&self) -> Result<RawTable, LoadFailure> {
        let bytes = fs::read(&self.path)?;
        let text = String::from_utf8(bytes).map_err(|_| LoadFailure::Encoding)?;
        Ok(csv::parse(&text)?)
    }

    /// Append one record as a new row, writing the header first if the store
    /// is absent or empty.
    ///
    /// Required fields are checked before any I/O. Not atomic: an interrupted
    /// write can leave a partial row.
    pub fn append(&mut self, record: &TreatmentRecord) -> StoreResult<()> {
        validate_required(record)?;

        match self.write_row(record) {
            Ok(wrote_header) => {
                self.cache.invalidate();
                info!(
                    path = %self.path.display(),
                    client_id = %record.client_id,
                    wrote_header,
                    "appended record"
                );
                Ok(())
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "append failed");
                Err(err)
            }
        }
    }

    fn write_row(&self, record: &TreatmentRecord) -> StoreResult<bool> {
        let path = self.path.as_path();
        let io_err = |e: io::Error| StoreError::from_io(path, e);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let (needs_header, needs_newline) = match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => (false, !ends_with_newline(path).map_err(io_err)?),
            Ok(_) => (true, false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (true, false),
            Err(e) => return Err(io_err(e)),
        };

        let mut buf = String::new();
        if needs_newline {
            buf.push('\n');
        }
        if needs_header {
            buf.push_str(&Column::header_row());
            buf.push('\n');
        }
        buf.push_str(&csv::format_row(record));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        file.write_all(buf.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        Ok(needs_header)
    }
}

fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
