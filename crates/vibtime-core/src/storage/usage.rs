//! Vibration usage counters.
//!
//! A running total plus one counter per local calendar day, keyed
//! `vibrations_YYYY-MM-DD`.

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use super::kv::{KvStore, KEY_DAILY_VIBRATIONS_PREFIX, KEY_TOTAL_VIBRATIONS};
use crate::error::StorageError;

/// Counter values after a recorded vibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCounts {
    pub total: i64,
    pub today: i64,
}

/// Storage key of the per-day counter for `date`.
pub fn daily_key(date: NaiveDate) -> String {
    format!("{KEY_DAILY_VIBRATIONS_PREFIX}{}", date.format("%Y-%m-%d"))
}

fn local_date(now_ms: u64) -> NaiveDate {
    local_datetime(now_ms).date_naive()
}

/// Local wall-clock time for an epoch-millisecond timestamp.
pub fn local_datetime(now_ms: u64) -> DateTime<Local> {
    Local
        .timestamp_millis_opt(now_ms as i64)
        .earliest()
        .unwrap_or_else(Local::now)
}

/// Count one played vibration.
pub fn record(store: &dyn KvStore, now_ms: u64) -> Result<UsageCounts, StorageError> {
    let total = store.increment(KEY_TOTAL_VIBRATIONS)?;
    let today = store.increment(&daily_key(local_date(now_ms)))?;
    tracing::debug!(total, today, "usage recorded");
    Ok(UsageCounts { total, today })
}

pub fn total(store: &dyn KvStore) -> Result<i64, StorageError> {
    Ok(store.get_i64(KEY_TOTAL_VIBRATIONS)?.unwrap_or(0))
}

/// Vibrations played on the local day containing `now_ms`.
pub fn today(store: &dyn KvStore, now_ms: u64) -> Result<i64, StorageError> {
    Ok(store.get_i64(&daily_key(local_date(now_ms)))?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MS_PER_HOUR;
    use crate::storage::kv::MemoryStore;

    #[test]
    fn daily_key_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(daily_key(date), "vibrations_2024-03-07");
    }

    #[test]
    fn record_bumps_both_counters() {
        let store = MemoryStore::new();
        let now = 1_700_000_000_000;
        assert_eq!(record(&store, now).unwrap(), UsageCounts { total: 1, today: 1 });
        assert_eq!(record(&store, now + 1_000).unwrap(), UsageCounts { total: 2, today: 2 });
        assert_eq!(total(&store).unwrap(), 2);
        assert_eq!(today(&store, now).unwrap(), 2);
    }

    #[test]
    fn new_day_starts_a_new_counter() {
        let store = MemoryStore::new();
        let now = 1_700_000_000_000;
        record(&store, now).unwrap();
        let tomorrow = now + 24 * MS_PER_HOUR;
        assert_eq!(today(&store, tomorrow).unwrap(), 0);
        assert_eq!(record(&store, tomorrow).unwrap(), UsageCounts { total: 2, today: 1 });
    }
}
