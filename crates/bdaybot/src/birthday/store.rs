//! Durable storage for birthday records.
//!
//! The backing file is a JSON mapping of subject id to record. It is re-read
//! on every operation and fully rewritten on every mutation, so concurrent
//! external edits are picked up and never merged against a stale snapshot.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::engine::{self, DateError};

/// A registered birthday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayRecord {
    /// Day and month in `DD-MM` format.
    pub date: String,
    /// Custom congratulation text; empty means the default greeting.
    #[serde(default)]
    pub message: String,
    /// Who registered the birthday; only they (or an admin) may remove it.
    pub added_by: String,
}

impl BirthdayRecord {
    /// The congratulation text to render, falling back to the default greeting.
    pub fn greeting(&self) -> &str {
        if self.message.is_empty() {
            super::DEFAULT_GREETING
        } else {
            &self.message
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("No birthday is registered for that user")]
    NotFound,
    #[error("Only the person who added the birthday or an admin can remove it")]
    NotAuthorized,
}

/// Store for the subject id -> [`BirthdayRecord`] mapping.
///
/// Mutations serialize the load-modify-save cycle behind an internal lock.
/// Reads stay lock-free: the file is replaced atomically (temp + rename), so
/// a read racing a write sees either the old or the new contents, never a
/// torn file.
#[derive(Clone)]
pub struct BirthdayStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl BirthdayStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the current mapping from disk.
    ///
    /// Never fails: a missing or empty file is initialized to an empty
    /// mapping, a file that is not a JSON mapping is reset to one, and
    /// entries missing required fields or carrying malformed dates are
    /// dropped. Any cleanup is written back immediately so the next load
    /// returns the same mapping.
    pub fn load(&self) -> HashMap<String, BirthdayRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = ?self.path, "Creating new birthday store");
                self.save(&HashMap::new());
                return HashMap::new();
            }
            Err(e) => {
                error!(error = %e, path = ?self.path, "Failed to read birthday store");
                return HashMap::new();
            }
        };

        if raw.trim().is_empty() {
            self.save(&HashMap::new());
            return HashMap::new();
        }

        let top_level: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Birthday store is not valid JSON, resetting");
                self.save(&HashMap::new());
                return HashMap::new();
            }
        };

        let Some(entries) = top_level.as_object() else {
            warn!("Birthday store is not a mapping, resetting");
            self.save(&HashMap::new());
            return HashMap::new();
        };

        let mut records = HashMap::new();
        let mut dropped = 0usize;
        for (subject_id, entry) in entries {
            match serde_json::from_value::<BirthdayRecord>(entry.clone()) {
                Ok(record) if engine::validate_date(&record.date).is_ok() => {
                    records.insert(subject_id.clone(), record);
                }
                _ => {
                    warn!(subject_id = %subject_id, "Dropping malformed birthday entry");
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            info!(dropped, kept = records.len(), "Cleaned birthday store");
            self.save(&records);
        }

        records
    }

    /// Rewrite the whole mapping. Write failures are logged, not propagated;
    /// callers must not assume the write landed.
    pub fn save(&self, records: &HashMap<String, BirthdayRecord>) {
        if let Err(e) = self.write_file(records) {
            error!(error = %e, path = ?self.path, "Failed to write birthday store");
        }
    }

    /// Register (or overwrite) a birthday after validating the date.
    pub fn add(
        &self,
        subject_id: &str,
        date: &str,
        message: &str,
        added_by: &str,
    ) -> Result<BirthdayRecord, StoreError> {
        engine::validate_date(date)?;

        let record = BirthdayRecord {
            date: date.to_string(),
            message: message.to_string(),
            added_by: added_by.to_string(),
        };

        let _guard = self.lock();
        let mut records = self.load();
        records.insert(subject_id.to_string(), record.clone());
        self.save(&records);

        Ok(record)
    }

    /// Remove a birthday. Only the user recorded in `added_by` or an admin
    /// may do so.
    pub fn remove(
        &self,
        subject_id: &str,
        requester_id: &str,
        requester_is_admin: bool,
    ) -> Result<BirthdayRecord, StoreError> {
        let _guard = self.lock();
        let mut records = self.load();

        match records.remove(subject_id) {
            None => Err(StoreError::NotFound),
            Some(record) if record.added_by != requester_id && !requester_is_admin => {
                Err(StoreError::NotAuthorized)
            }
            Some(record) => {
                self.save(&records);
                Ok(record)
            }
        }
    }

    /// Atomic full-file replacement: write a temp file, then rename it over
    /// the store so readers never observe a partial write.
    fn write_file(&self, records: &HashMap<String, BirthdayRecord>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(records).context("Failed to serialize birthday store")?;

        let tmp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp_path, content).context("Failed to write birthday store temp file")?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("Failed to replace birthday store");
        }

        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
