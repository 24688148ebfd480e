//! Persistent key-value store adapter for buffer state.
//!
//! The buffer mirrors its durable state — the device id and the three
//! pending-metric collections — into a simple string-keyed store so it
//! survives process restarts. Collections are stored as JSON-encoded
//! blobs under fixed keys; a blob that fails to decode is treated as the
//! empty collection and never surfaced as an error.
//!
//! Two implementations are provided: [`FileStore`] (a single JSON file,
//! written through on every update) and [`MemoryStore`] (for tests and
//! ephemeral use). Hosts with their own settings machinery can implement
//! [`StateStore`] over it directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::StoreError;
use crate::metric::{Counter, Event, Gauge};

/// Store key for the persisted device id.
pub const KEY_DEVICE_ID: &str = "deviceID";
/// Store key for the pending counters blob.
pub const KEY_STORED_COUNTERS: &str = "storedCounters";
/// Store key for the pending gauges blob.
pub const KEY_STORED_GAUGES: &str = "storedGauges";
/// Store key for the pending events blob.
pub const KEY_STORED_EVENTS: &str = "storedEvents";

/// A durable string-keyed store for buffer state.
///
/// Writes must be synchronous: when `put` returns, the value is expected
/// to survive a process kill (to the extent the backing medium allows).
pub trait StateStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be written durably.
    fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Typed accessors over any [`StateStore`].
///
/// Decode failure of any blob logs a warning and yields the empty
/// collection — corrupted local state degrades to re-counting from zero,
/// it never breaks the caller.
pub trait StateStoreExt: StateStore {
    /// Returns the persisted device id, if one has been generated.
    fn device_id(&self) -> Option<String> {
        self.get(KEY_DEVICE_ID)
    }

    /// Persists the device id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_device_id(&self, device_id: &str) -> Result<(), StoreError> {
        self.put(KEY_DEVICE_ID, device_id.to_string())
    }

    /// Returns the persisted pending counters, or the empty map.
    fn counters(&self) -> HashMap<String, Counter> {
        decode_blob(self.get(KEY_STORED_COUNTERS), KEY_STORED_COUNTERS)
    }

    /// Persists the pending counters.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn set_counters(&self, counters: &HashMap<String, Counter>) -> Result<(), StoreError> {
        self.put(KEY_STORED_COUNTERS, encode_blob(counters)?)
    }

    /// Returns the persisted pending gauges, or the empty sequence.
    fn gauges(&self) -> Vec<Gauge> {
        decode_blob(self.get(KEY_STORED_GAUGES), KEY_STORED_GAUGES)
    }

    /// Persists the pending gauges.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn set_gauges(&self, gauges: &[Gauge]) -> Result<(), StoreError> {
        self.put(KEY_STORED_GAUGES, encode_blob(&gauges)?)
    }

    /// Returns the persisted pending events, or the empty sequence.
    fn events(&self) -> Vec<Event> {
        decode_blob(self.get(KEY_STORED_EVENTS), KEY_STORED_EVENTS)
    }

    /// Persists the pending events.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn set_events(&self, events: &[Event]) -> Result<(), StoreError> {
        self.put(KEY_STORED_EVENTS, encode_blob(&events)?)
    }
}

impl<T: StateStore + ?Sized> StateStoreExt for T {}

fn encode_blob<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialize { source: e })
}

fn decode_blob<T: serde::de::DeserializeOwned + Default>(blob: Option<String>, key: &str) -> T {
    let Some(blob) = blob else {
        return T::default();
    };
    match serde_json::from_str(&blob) {
        Ok(value) => value,
        Err(e) => {
            warn!("discarding corrupted blob under '{key}': {e}");
            T::default()
        }
    }
}

/// A [`StateStore`] backed by a single JSON file.
///
/// The full key→value map is loaded at open and rewritten on every `put`.
/// A missing or corrupted file opens as empty state.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, creating empty state if the file does
    /// not exist or cannot be parsed.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!("state file '{}' is corrupted, starting empty: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!("state file '{}' could not be read, starting empty: {e}", path.display());
                HashMap::new()
            }
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn write_through(&self, state: &HashMap<String, String>) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialize { source: e })?;
        std::fs::write(&self.path, data).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.state.lock().expect("state lock poisoned").get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        state.insert(key.to_string(), value);
        self.write_through(&state)
    }
}

/// An in-memory [`StateStore`] that forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.state.lock().expect("state lock poisoned").get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.state
            .lock()
            .expect("state lock poisoned")
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_none());

        store.put("k", "v".to_string()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = FileStore::open(&path);
            store.set_device_id("device-1").unwrap();
            let mut counters = HashMap::new();
            counters.insert("x".to_string(), Counter::new("x", 5, 100));
            store.set_counters(&counters).unwrap();
        }

        let store = FileStore::open(&path);
        assert_eq!(store.device_id().as_deref(), Some("device-1"));
        let counters = store.counters();
        assert_eq!(counters["x"].count, 5);
        assert_eq!(counters["x"].created_at, 100);
    }

    #[test]
    fn file_store_opens_empty_on_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all {{{").unwrap();

        let store = FileStore::open(&path);
        assert!(store.device_id().is_none());
        assert!(store.counters().is_empty());
    }

    #[test]
    fn file_store_opens_empty_when_state_unreadable() {
        let dir = tempdir().unwrap();

        // A directory at the state path fails to read with something
        // other than NotFound.
        let store = FileStore::open(dir.path());
        assert!(store.device_id().is_none());
        assert!(store.counters().is_empty());

        // Writing through to a directory path surfaces the I/O error.
        assert!(store.put("k", "v".to_string()).is_err());
    }

    #[test]
    fn corrupted_blob_decodes_as_empty_collection() {
        let store = MemoryStore::new();
        store
            .put(KEY_STORED_COUNTERS, "][ definitely not json".to_string())
            .unwrap();
        store.put(KEY_STORED_GAUGES, "42".to_string()).unwrap();

        assert!(store.counters().is_empty());
        assert!(store.gauges().is_empty());
        assert!(store.events().is_empty());
    }

    #[test]
    fn typed_accessors_round_trip() {
        let store = MemoryStore::new();

        let gauges = vec![Gauge::new("g", 1.5, 10), Gauge::new("g", 2.5, 20)];
        store.set_gauges(&gauges).unwrap();
        assert_eq!(store.gauges(), gauges);

        let events = vec![Event::new("e", None, 30)];
        store.set_events(&events).unwrap();
        assert_eq!(store.events(), events);
    }
}
