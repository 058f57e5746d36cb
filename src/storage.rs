//! Local persistence for captured leads and analytics events.
//!
//! Both stores are append-only JSON arrays kept under fixed keys in a
//! [`KeyValueBackend`]. Every append is a full read-modify-write with no
//! locking across calls: two writers interleaving around the same key lose
//! one update (last writer wins). Storage failures are logged and swallowed
//! so that capturing a lead never fails because the disk is full. An append
//! whose read fails is skipped rather than written over what it could not
//! see; a corrupt array is discarded and the store starts over.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::errors::{AppError, ResultExt};
use crate::integrity::ChecksummedEntry;
use crate::models::{AnalyticsEvent, Lead};

pub const LEADS_KEY: &str = "bte_leads";
pub const EVENTS_KEY: &str = "bte_analytics_events";

/// Retention cap of the event log.
pub const MAX_EVENTS: usize = 1000;

/// String key-value persistence, the moral equivalent of browser local storage.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// In-process backend. Optionally enforces a byte quota across all keys so
/// that quota-exceeded behaviour can be exercised.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Storage("memory backend lock poisoned".to_string()))
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(AppError::Storage(format!(
                    "quota of {} bytes exceeded writing '{}'",
                    quota, key
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Backend storing each key as `<dir>/<key>.json`, wrapped in a checksummed
/// envelope. Writes go to a temporary file first and are renamed into place.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens (and creates if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(AppError::from)
            .with_context(|| format!("creating storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        let raw = match blocking(|| fs::read_to_string(&path)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::from(e)).context(format!("reading '{}'", key)),
        };

        // A corrupt file is as good as absent; only I/O failures are errors.
        let data = ChecksummedEntry::deserialize_and_validate(&raw);
        if data.is_none() {
            tracing::warn!(
                "'{}' is corrupt or failed checksum validation, treating as empty",
                path.display()
            );
        }
        Ok(data)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let envelope = ChecksummedEntry::new(value.to_string()).serialize()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        blocking(|| fs::write(&tmp, envelope))
            .map_err(AppError::from)
            .context(format!("writing '{}'", key))?;
        blocking(|| fs::rename(&tmp, &path))
            .map_err(AppError::from)
            .context(format!("replacing '{}'", key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        match blocking(|| fs::remove_file(self.path_for(key))) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::from(e)).context(format!("removing '{}'", key)),
        }
    }
}

/// Runs filesystem work on a multi-threaded runtime without stalling the
/// worker's other tasks. Outside a runtime, or on a current-thread one, the
/// closure just runs inline.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// A JSON array stored under one key. Nothing fails outward: an absent or
/// unparsable array reads as empty, a failed write is logged.
struct JsonLog {
    backend: Arc<dyn KeyValueBackend>,
    key: &'static str,
}

impl JsonLog {
    /// Current contents. `Err` only when the backend could not be read at
    /// all; the caller must not write back in that case or it would
    /// overwrite entries it never saw.
    fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, AppError> {
        let Some(raw) = self.backend.get(self.key)? else {
            return Ok(Vec::new());
        };

        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::error!("Error parsing '{}' from storage: {}", self.key, e);
            Vec::new()
        }))
    }

    fn read<T: DeserializeOwned>(&self) -> Vec<T> {
        self.load().unwrap_or_else(|e| {
            tracing::error!("Error reading '{}' from storage: {}", self.key, e);
            Vec::new()
        })
    }

    /// Read-modify-write of the whole array. Skipped, with an error log,
    /// when the current contents cannot be read.
    fn update<T, F>(&self, modify: F)
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>),
    {
        let mut items = match self.load() {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    "Error reading '{}' from storage, append skipped: {}",
                    self.key,
                    e
                );
                return;
            }
        };
        modify(&mut items);
        self.write(&items);
    }

    fn write<T: Serialize>(&self, items: &[T]) {
        let result = serde_json::to_string(items)
            .map_err(AppError::from)
            .and_then(|json| self.backend.set(self.key, &json));

        if let Err(e) = result {
            tracing::error!("Error saving '{}' to storage: {}", self.key, e);
        }
    }

    fn clear(&self) {
        if let Err(e) = self.backend.remove(self.key) {
            tracing::error!("Error clearing '{}' from storage: {}", self.key, e);
        }
    }
}

/// Append-only store of interaction events, capped at [`MAX_EVENTS`] with
/// oldest-first eviction.
pub struct EventLog {
    log: JsonLog,
    capacity: usize,
}

impl EventLog {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_capacity(backend, MAX_EVENTS)
    }

    pub fn with_capacity(backend: Arc<dyn KeyValueBackend>, capacity: usize) -> Self {
        Self {
            log: JsonLog {
                backend,
                key: EVENTS_KEY,
            },
            capacity,
        }
    }

    pub fn append(&self, event: AnalyticsEvent) {
        let capacity = self.capacity;
        self.log.update(|events: &mut Vec<AnalyticsEvent>| {
            events.push(event);
            if events.len() > capacity {
                let excess = events.len() - capacity;
                events.drain(..excess);
            }
        });
    }

    /// Events in insertion order.
    pub fn list(&self) -> Vec<AnalyticsEvent> {
        self.log.read()
    }

    pub fn clear(&self) {
        self.log.clear();
    }
}

/// Append-only store of captured leads.
pub struct LeadStore {
    log: JsonLog,
}

impl LeadStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            log: JsonLog {
                backend,
                key: LEADS_KEY,
            },
        }
    }

    /// Persists the lead and hands it back. A storage failure is logged; the
    /// in-memory lead is still returned. Leads already stored are never
    /// dropped by an append, even when the store cannot be read.
    pub fn append(&self, lead: Lead) -> Lead {
        self.log.update(|leads: &mut Vec<Lead>| leads.push(lead.clone()));
        lead
    }

    /// Leads in insertion order.
    pub fn list(&self) -> Vec<Lead> {
        self.log.read()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.log.clear();
    }
}
