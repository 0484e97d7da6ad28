//! Flat key -> primitive persistence.
//!
//! Values are stored as strings so any backend with a string map can serve;
//! typed accessors parse on the way out.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageError;

pub const KEY_LAST_VIBRATION_TIME: &str = "last_vibration_time";
pub const KEY_SERVICE_START_TIME: &str = "service_start_time";
pub const KEY_WATCH_MODE_START_TIME: &str = "watch_mode_start_time";
pub const KEY_WATCH_MODE_DURATION: &str = "watch_mode_duration";
pub const KEY_TOTAL_VIBRATIONS: &str = "total_vibrations";
/// Prefix of the per-day counter, followed by `YYYY-MM-DD`.
pub const KEY_DAILY_VIBRATIONS_PREFIX: &str = "vibrations_";

pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn get_i64(&self, key: &str) -> Result<Option<i64>, StorageError> {
        match self.get_raw(key)? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StorageError::InvalidValue {
                    key: key.to_string(),
                    expected: "integer",
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.set_raw(key, &value.to_string())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        match self.get_raw(key)? {
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .map(Some)
                .map_err(|_| StorageError::InvalidValue {
                    key: key.to_string(),
                    expected: "boolean",
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set_raw(key, if value { "true" } else { "false" })
    }

    /// Add one to an integer counter (missing = 0) and return the new value.
    fn increment(&self, key: &str) -> Result<i64, StorageError> {
        let next = self.get_i64(key)?.unwrap_or(0) + 1;
        self.set_i64(key, next)?;
        Ok(next)
    }
}

/// Epoch-millisecond timestamp stored under `key`, if any.
pub(crate) fn get_timestamp(store: &dyn KvStore, key: &str) -> Result<Option<u64>, StorageError> {
    Ok(store.get_i64(key)?.map(|v| v.max(0) as u64))
}

pub(crate) fn set_timestamp(store: &dyn KvStore, key: &str, ms: u64) -> Result<(), StorageError> {
    store.set_i64(key, ms as i64)
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip() {
        let store = MemoryStore::new();
        store.set_i64(KEY_LAST_VIBRATION_TIME, 1_700_000_000_000).unwrap();
        store.set_bool("service_running", true).unwrap();
        assert_eq!(
            store.get_i64(KEY_LAST_VIBRATION_TIME).unwrap(),
            Some(1_700_000_000_000)
        );
        assert_eq!(store.get_bool("service_running").unwrap(), Some(true));
        assert_eq!(store.get_i64("missing").unwrap(), None);
    }

    #[test]
    fn mistyped_value_is_reported() {
        let store = MemoryStore::new();
        store.set_raw(KEY_SERVICE_START_TIME, "yesterday").unwrap();
        let err = store.get_i64(KEY_SERVICE_START_TIME).unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue { expected: "integer", .. }));
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.remove("nothing").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn increment_starts_from_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.increment(KEY_TOTAL_VIBRATIONS).unwrap(), 1);
        assert_eq!(store.increment(KEY_TOTAL_VIBRATIONS).unwrap(), 2);
    }
}
