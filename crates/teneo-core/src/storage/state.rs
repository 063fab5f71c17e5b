//! Durable client state, merged from partial updates.
//!
//! The whole record lives in one JSON file (`localStorage.json`) and is
//! rewritten on every merge. A field in an update only overwrites the
//! stored value when it is non-empty / non-zero, so partial updates from
//! the connection, the liveness signaler and the reward ticker never clear
//! each other's fields. A real update of a counter to exactly zero is
//! therefore not observable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::data_dir;
use crate::error::StorageError;

const STATE_FILE: &str = "localStorage.json";

/// The persisted record. One per installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Last heartbeat deadline anchor: set on connect and on every
    /// authoritative points push. `None` means never connected.
    #[serde(
        rename = "lastUpdated",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub last_heartbeat_at: Option<DateTime<Utc>>,

    #[serde(rename = "pointsTotal")]
    pub points_total: u64,

    #[serde(rename = "pointsToday")]
    pub points_today: u64,

    #[serde(
        rename = "lastPingDate",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub last_ping_sent_at: Option<DateTime<Utc>>,

    /// Local estimate, always within [0, 25].
    #[serde(rename = "potentialPoints")]
    pub estimated_points: f64,

    #[serde(rename = "countdown")]
    pub countdown_label: String,

    #[serde(rename = "userId")]
    pub identity: String,
}

impl PersistedState {
    /// Apply `update` field by field, keeping the stored value wherever the
    /// update carries an empty string, a zero, or `None`.
    pub fn apply(&mut self, update: &PersistedState) {
        if update.last_heartbeat_at.is_some() {
            self.last_heartbeat_at = update.last_heartbeat_at;
        }
        if update.points_total != 0 {
            self.points_total = update.points_total;
        }
        if update.points_today != 0 {
            self.points_today = update.points_today;
        }
        if update.last_ping_sent_at.is_some() {
            self.last_ping_sent_at = update.last_ping_sent_at;
        }
        if update.estimated_points != 0.0 {
            self.estimated_points = update.estimated_points;
        }
        if !update.countdown_label.is_empty() {
            self.countdown_label.clone_from(&update.countdown_label);
        }
        if !update.identity.is_empty() {
            self.identity.clone_from(&update.identity);
        }
    }

    pub fn has_identity(&self) -> bool {
        !self.identity.is_empty()
    }
}

/// Older clients wrote `""` for unset timestamps.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// File-backed store for [`PersistedState`].
///
/// Clones share one lock, so every read-modify-write in the process is
/// serialized. Writes go to a temporary sibling file that is then renamed
/// over the target, so readers never observe a half-written record.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl StateStore {
    /// Open the store at `~/.config/teneo-node/localStorage.json`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open() -> Result<Self, StorageError> {
        Ok(Self::at(data_dir()?.join(STATE_FILE)))
    }

    /// Store backed by an explicit file (tests, `--state-file`).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. A missing file yields the zero-valued record.
    pub fn read(&self) -> Result<PersistedState, StorageError> {
        let content = match std::fs::read_to_string(self.path.as_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedState::default())
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.to_path_buf(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(PersistedState::default());
        }
        serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: self.path.to_path_buf(),
            source,
        })
    }

    /// Merge `update` into the stored record and return the result.
    pub fn merge(&self, update: PersistedState) -> Result<PersistedState, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut current = self.read()?;
        current.apply(&update);
        self.write(&current)?;
        Ok(current)
    }

    /// Remove the record entirely (logout).
    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        match std::fs::remove_file(self.path.as_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                path: self.path.to_path_buf(),
                source,
            }),
        }
    }

    fn write(&self, state: &PersistedState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state).map_err(StorageError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, self.path.as_path()).map_err(|source| StorageError::Io {
            path: self.path.to_path_buf(),
            source,
        })
    }
}
