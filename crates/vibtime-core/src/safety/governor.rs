//! Safety governor.
//!
//! Reads `service_start_time` and `last_vibration_time` from the store on
//! every query, so predicates reflect writes made by other components.
//! [`SafetyGovernor::tick`] is meant to be called once per second while the
//! background service runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::SafetyLimits;
use crate::clock::MS_PER_SECOND;
use crate::events::Event;
use crate::storage::kv::{
    get_timestamp, set_timestamp, KvStore, KEY_LAST_VIBRATION_TIME, KEY_SERVICE_START_TIME,
};

/// Progress-bar data published on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyTick {
    pub remaining_service_ms: u64,
    /// Fraction of the runtime cap already used, 0.0-1.0.
    pub service_progress: f32,
    pub remaining_vibration_cooldown_ms: u64,
    /// Fraction of the inter-vibration interval already elapsed, 0.0-1.0.
    pub vibration_progress: f32,
}

pub struct SafetyGovernor {
    store: Arc<dyn KvStore>,
    limits: SafetyLimits,
    monitoring: bool,
    warned: bool,
    expiry_reported: bool,
}

impl SafetyGovernor {
    pub fn new(store: Arc<dyn KvStore>, limits: SafetyLimits) -> Self {
        Self {
            store,
            limits,
            monitoring: false,
            warned: false,
            expiry_reported: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn limits(&self) -> SafetyLimits {
        self.limits
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn service_start_time(&self) -> Option<u64> {
        self.timestamp(KEY_SERVICE_START_TIME)
    }

    pub fn last_vibration_time(&self) -> Option<u64> {
        self.timestamp(KEY_LAST_VIBRATION_TIME)
    }

    /// Full runtime when no service start is recorded.
    pub fn remaining_service_ms(&self, now_ms: u64) -> u64 {
        match self.service_start_time() {
            Some(start) => self
                .limits
                .max_service_runtime_ms
                .saturating_sub(now_ms.saturating_sub(start)),
            None => self.limits.max_service_runtime_ms,
        }
    }

    pub fn remaining_vibration_cooldown_ms(&self, now_ms: u64) -> u64 {
        match self.last_vibration_time() {
            Some(last) => self
                .limits
                .min_vibration_interval_ms
                .saturating_sub(now_ms.saturating_sub(last)),
            None => 0,
        }
    }

    pub fn can_trigger_vibration(&self, now_ms: u64) -> bool {
        self.remaining_vibration_cooldown_ms(now_ms) == 0
    }

    /// False when no service start has been recorded.
    pub fn is_service_expired(&self, now_ms: u64) -> bool {
        self.service_start_time().is_some() && self.remaining_service_ms(now_ms) == 0
    }

    pub fn snapshot(&self, now_ms: u64) -> SafetyTick {
        let remaining_service_ms = self.remaining_service_ms(now_ms);
        let remaining_vibration_cooldown_ms = self.remaining_vibration_cooldown_ms(now_ms);
        SafetyTick {
            remaining_service_ms,
            service_progress: used_fraction(
                remaining_service_ms,
                self.limits.max_service_runtime_ms,
            ),
            remaining_vibration_cooldown_ms,
            vibration_progress: used_fraction(
                remaining_vibration_cooldown_ms,
                self.limits.min_vibration_interval_ms,
            ),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn record_service_start(&mut self, now_ms: u64) {
        if let Err(e) = set_timestamp(self.store.as_ref(), KEY_SERVICE_START_TIME, now_ms) {
            warn!(error = %e, "could not persist service start time");
        }
        self.warned = false;
        self.expiry_reported = false;
        info!(now_ms, "service start recorded");
    }

    pub fn record_vibration(&mut self, now_ms: u64) {
        if let Err(e) = set_timestamp(self.store.as_ref(), KEY_LAST_VIBRATION_TIME, now_ms) {
            warn!(error = %e, "could not persist last vibration time");
        }
        info!(now_ms, "vibration recorded");
    }

    pub fn start_monitoring(&mut self) {
        self.monitoring = true;
        self.warned = false;
        self.expiry_reported = false;
        info!(limits = ?self.limits, "safety monitoring started");
    }

    pub fn stop_monitoring(&mut self) {
        if self.monitoring {
            self.monitoring = false;
            info!("safety monitoring stopped");
        }
    }

    /// One monitoring step. Emits the progress snapshot, then the warning and
    /// expiry notifications, each at most once per monitoring run, then
    /// `FrequencyLimit` on every step the inter-vibration interval is running.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        if !self.monitoring {
            return Vec::new();
        }
        let tick = self.snapshot(now_ms);
        let mut events = vec![Event::SafetyTick(tick)];

        let remaining = tick.remaining_service_ms;
        if remaining > 0 && remaining <= self.limits.warning_threshold_ms && !self.warned {
            self.warned = true;
            warn!(remaining = %format_time(remaining), "service auto-stop approaching");
            events.push(Event::AutoStopWarning {
                remaining_ms: remaining,
            });
        }

        if self.is_service_expired(now_ms) && !self.expiry_reported {
            self.expiry_reported = true;
            self.monitoring = false;
            warn!("maximum service runtime reached");
            events.push(Event::ServiceExpired);
        }

        if tick.remaining_vibration_cooldown_ms > 0 {
            events.push(Event::FrequencyLimit {
                remaining_ms: tick.remaining_vibration_cooldown_ms,
            });
        }

        events
    }

    /// Forget both timestamps and stop monitoring.
    pub fn emergency_stop(&mut self) -> Event {
        for key in [KEY_SERVICE_START_TIME, KEY_LAST_VIBRATION_TIME] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "could not clear safety key");
            }
        }
        self.monitoring = false;
        self.warned = false;
        self.expiry_reported = false;
        warn!("emergency stop");
        Event::AutoStop
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn timestamp(&self, key: &str) -> Option<u64> {
        get_timestamp(self.store.as_ref(), key).unwrap_or_else(|e| {
            warn!(key, error = %e, "unreadable timestamp ignored");
            None
        })
    }
}

fn used_fraction(remaining_ms: u64, total_ms: u64) -> f32 {
    if total_ms == 0 {
        return 1.0;
    }
    (1.0 - remaining_ms as f32 / total_ms as f32).clamp(0.0, 1.0)
}

/// `m:ss`, minutes unbounded.
pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / MS_PER_SECOND;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MS_PER_HOUR, MS_PER_MINUTE};
    use crate::storage::kv::MemoryStore;

    const T0: u64 = 1_700_000_000_000;

    fn governor(limits: SafetyLimits) -> (SafetyGovernor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SafetyGovernor::new(store.clone(), limits), store)
    }

    #[test]
    fn test_mode_expires_after_five_minutes() {
        let (mut g, _) = governor(SafetyLimits::test());
        let now = T0 + 5 * MS_PER_MINUTE + MS_PER_SECOND;
        g.record_service_start(T0);
        assert!(g.is_service_expired(now));
        assert!(!g.is_service_expired(T0 + 4 * MS_PER_MINUTE));
    }

    #[test]
    fn no_start_recorded_is_not_expired() {
        let (g, _) = governor(SafetyLimits::production());
        assert!(!g.is_service_expired(T0));
        assert_eq!(g.remaining_service_ms(T0), 3 * MS_PER_HOUR);
    }

    #[test]
    fn vibration_interval_gates_triggers() {
        let (mut g, _) = governor(SafetyLimits::production());
        assert!(g.can_trigger_vibration(T0));
        g.record_vibration(T0);
        assert!(!g.can_trigger_vibration(T0 + 9 * MS_PER_MINUTE));
        assert_eq!(
            g.remaining_vibration_cooldown_ms(T0 + 9 * MS_PER_MINUTE),
            MS_PER_MINUTE
        );
        assert!(g.can_trigger_vibration(T0 + 10 * MS_PER_MINUTE));
    }

    #[test]
    fn predicates_do_not_mutate() {
        let (mut g, store) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        let before = store.len();
        let _ = g.can_trigger_vibration(T0);
        let _ = g.is_service_expired(T0);
        let _ = g.snapshot(T0);
        assert_eq!(store.len(), before);
        assert!(!g.is_monitoring());
    }

    #[test]
    fn snapshot_progress() {
        let (mut g, _) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        g.record_vibration(T0);
        let tick = g.snapshot(T0 + 90 * MS_PER_MINUTE);
        assert_eq!(tick.remaining_service_ms, 90 * MS_PER_MINUTE);
        assert!((tick.service_progress - 0.5).abs() < 1e-6);
        assert_eq!(tick.remaining_vibration_cooldown_ms, 0);
        assert_eq!(tick.vibration_progress, 1.0);
    }

    #[test]
    fn tick_does_nothing_until_monitoring() {
        let (mut g, _) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        assert!(g.tick(T0).is_empty());
        g.start_monitoring();
        assert!(matches!(g.tick(T0).as_slice(), [Event::SafetyTick(_)]));
    }

    #[test]
    fn warning_and_expiry_fire_once() {
        let (mut g, _) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        g.start_monitoring();

        let warn_at = T0 + 3 * MS_PER_HOUR - 15 * MS_PER_MINUTE;
        let events = g.tick(warn_at);
        assert_eq!(
            events[1],
            Event::AutoStopWarning {
                remaining_ms: 15 * MS_PER_MINUTE
            }
        );
        assert_eq!(g.tick(warn_at + MS_PER_SECOND).len(), 1);

        let events = g.tick(T0 + 3 * MS_PER_HOUR);
        assert_eq!(events.last(), Some(&Event::ServiceExpired));
        assert!(!g.is_monitoring());
        assert!(g.tick(T0 + 3 * MS_PER_HOUR + MS_PER_SECOND).is_empty());
    }

    #[test]
    fn test_mode_warns_on_first_tick() {
        let (mut g, _) = governor(SafetyLimits::test());
        g.record_service_start(T0);
        g.start_monitoring();

        let events = g.tick(T0 + MS_PER_SECOND);
        assert_eq!(
            events[1],
            Event::AutoStopWarning {
                remaining_ms: 5 * MS_PER_MINUTE - MS_PER_SECOND
            }
        );
        assert_eq!(g.tick(T0 + 2 * MS_PER_SECOND).len(), 1);
    }

    #[test]
    fn tick_reports_frequency_limit_while_interval_runs() {
        let (mut g, _) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        g.record_vibration(T0);
        g.start_monitoring();

        let events = g.tick(T0 + 4 * MS_PER_MINUTE);
        assert_eq!(
            events.last(),
            Some(&Event::FrequencyLimit {
                remaining_ms: 6 * MS_PER_MINUTE
            })
        );
        assert!(matches!(
            g.tick(T0 + 10 * MS_PER_MINUTE).as_slice(),
            [Event::SafetyTick(_)]
        ));
    }

    #[test]
    fn expiry_without_prior_tick_skips_warning() {
        let (mut g, _) = governor(SafetyLimits::test());
        g.record_service_start(T0);
        g.start_monitoring();
        let events = g.tick(T0 + 6 * MS_PER_MINUTE);
        assert!(matches!(
            events.as_slice(),
            [Event::SafetyTick(_), Event::ServiceExpired]
        ));
    }

    #[test]
    fn emergency_stop_clears_state() {
        let (mut g, store) = governor(SafetyLimits::production());
        g.record_service_start(T0);
        g.record_vibration(T0);
        g.start_monitoring();
        assert_eq!(g.emergency_stop(), Event::AutoStop);
        assert!(store.is_empty());
        assert!(!g.is_monitoring());
        assert!(g.can_trigger_vibration(T0));
    }

    #[test]
    fn format_time_pads_seconds() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(65_000), "1:05");
        assert_eq!(format_time(15 * MS_PER_MINUTE), "15:00");
        assert_eq!(format_time(3 * MS_PER_HOUR + 999), "180:00");
    }
}
