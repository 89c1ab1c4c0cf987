//! Durable record of delivered event IDs.
//!
//! This module provides the [`DedupStore`], which tracks which events have
//! already been delivered so a relay replaying stored notes (on reconnect or
//! restart) does not cause duplicate notifications.
//!
//! # Record Format
//!
//! ```json
//! {"note_ids": {"<event id>": true, "...": true}}
//! ```
//!
//! Only IDs mapped to `true` are members. IDs are written sorted so the file
//! diffs cleanly.
//!
//! # Durability
//!
//! An ID is recorded only after its delivery succeeded, and the whole set is
//! rewritten after every mark. A crash between delivery and the write replays
//! that one event on restart (at-least-once). Writes go to `<path>.tmp` and are
//! renamed over the record, so a crash mid-write leaves the previous record
//! intact.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors loading the dedupe record at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The record exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Record path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The record is not valid JSON of the expected shape.
    #[error("malformed dedupe record {path}: {source}")]
    Malformed {
        /// Record path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Errors writing the dedupe record.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The set could not be serialized.
    #[error("failed to serialize dedupe record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The record could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Record path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// On-disk shape of the record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DedupeRecord {
    #[serde(default)]
    note_ids: BTreeMap<String, bool>,
}

/// File-backed set of delivered event IDs.
///
/// Thread-safe: share via `Arc<DedupStore>`. One mutex guards membership
/// checks, marks, and the write that follows a mark.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    ids: Mutex<HashSet<String>>,
}

impl DedupStore {
    /// Load the record at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// mark. Any other read failure or malformed content is an error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use notebridge_ingest::DedupStore;
    ///
    /// let store = DedupStore::load("./posted_notes.json")?;
    /// if !store.contains("ab12...") {
    ///     // deliver, then:
    ///     store.mark_and_persist("ab12...")?;
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No dedupe record at {}, starting empty",
                    path.display()
                );
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(LoadError::Io { path, source }),
        };

        let record: DedupeRecord =
            serde_json::from_slice(&bytes).map_err(|source| LoadError::Malformed {
                path: path.clone(),
                source,
            })?;

        let ids: HashSet<String> = record
            .note_ids
            .into_iter()
            .filter_map(|(id, posted)| posted.then_some(id))
            .collect();

        info!(
            "Loaded dedupe record from {}: {} event IDs",
            path.display(),
            ids.len()
        );

        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    /// An empty store that will write to `path`.
    pub fn empty<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ids: Mutex::new(HashSet::new()),
        }
    }

    /// Check if an event ID has already been delivered.
    pub fn contains(&self, event_id: &str) -> bool {
        self.ids.lock().contains(event_id)
    }

    /// Record a delivered event ID and rewrite the record.
    ///
    /// Call only after delivery succeeded. The ID stays marked in memory even
    /// when the write fails, so this process will not deliver it again; the
    /// durable copy catches up on the next successful write.
    pub fn mark_and_persist(&self, event_id: &str) -> Result<(), PersistError> {
        let mut ids = self.ids.lock();
        ids.insert(event_id.to_string());
        write_record(&self.path, &ids)?;
        debug!(event_id, total = ids.len(), "Persisted dedupe record");
        Ok(())
    }

    /// Number of recorded event IDs.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Whether no event IDs are recorded.
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Path of the durable record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sorted copy of the recorded IDs.
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.lock().iter().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

/// Write the full set atomically: temp file, fsync, rename, fsync directory.
fn write_record(path: &Path, ids: &HashSet<String>) -> Result<(), PersistError> {
    let io_err = |source: io::Error| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let record = DedupeRecord {
        note_ids: ids.iter().map(|id| (id.clone(), true)).collect(),
    };
    let bytes = serde_json::to_vec(&record)?;

    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let tmp_path = tmp_path(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }

    std::fs::rename(&tmp_path, path).map_err(io_err)?;
    File::open(dir).and_then(|d| d.sync_all()).map_err(io_err)?;

    Ok(())
}

/// Directory holding `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
