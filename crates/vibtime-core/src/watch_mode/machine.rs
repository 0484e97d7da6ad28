//! Watch-mode state machine.
//!
//! Wall-clock driven like the rest of the core: no internal timers. The
//! caller forwards sensor samples to [`WatchModeManager::on_sample`] and
//! calls [`WatchModeManager::tick`] about once per second; the session
//! deadline and the cooldown countdown are both evaluated there.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Listening -> (Fired | Expired | Stopped) -> Idle
//! ```
//!
//! Only `Fired` starts the cooldown. Once a session has left `Listening`,
//! late samples and ticks for it are no-ops.
//!
//! The cooldown is read from `last_vibration_time` in the store on every
//! query. Any played vibration writes that key, so the live state and the
//! state restored after a restart are the same.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cooldown::CooldownWindow;
use super::{StopReason, WatchDuration};
use crate::error::DetectionError;
use crate::events::Event;
use crate::sensor::{SensorSample, SensorSource};
use crate::storage::kv::{
    get_timestamp, set_timestamp, KvStore, KEY_LAST_VIBRATION_TIME, KEY_WATCH_MODE_DURATION,
    KEY_WATCH_MODE_START_TIME,
};
use crate::tap::PROCESS_INTERVAL_MS;

/// An active listening window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchModeSession {
    pub id: Uuid,
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl WatchModeSession {
    pub fn deadline_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms().saturating_sub(now_ms)
    }
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchModeStatus {
    pub active: bool,
    pub start_time: Option<u64>,
    pub duration_ms: Option<u64>,
    pub remaining_time_ms: u64,
    pub in_cooldown: bool,
    pub remaining_cooldown_ms: u64,
}

/// A sample that passed the active check and the throttle.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSample {
    pub magnitude: f32,
    pub events: Vec<Event>,
}

pub struct WatchModeManager {
    store: Arc<dyn KvStore>,
    threshold: f32,
    session: Option<WatchModeSession>,
    /// Countdown events are being emitted on tick.
    counting_down: bool,
    /// Set by `cleanup`; no countdown events until the next start.
    countdown_halted: bool,
    last_processed_ms: Option<u64>,
}

impl WatchModeManager {
    pub fn new(store: Arc<dyn KvStore>, threshold: f32) -> Self {
        Self {
            store,
            threshold,
            session: None,
            counting_down: false,
            countdown_halted: false,
            last_processed_ms: None,
        }
    }

    /// Discard a session left behind by a previous process and resume the
    /// countdown if the persisted cooldown is still running.
    pub fn initialize(&mut self, now_ms: u64) -> Option<Event> {
        if self.session.is_none() {
            self.clear_persisted_session();
        }
        self.countdown_halted = false;

        let remaining = self.remaining_cooldown_ms(now_ms);
        info!(remaining_cooldown_ms = remaining, "watch mode initialized");
        if remaining > 0 {
            self.counting_down = true;
            return Some(self.cooldown_tick(now_ms));
        }
        None
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<WatchModeSession> {
        self.session
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_in_cooldown(&self, now_ms: u64) -> bool {
        self.cooldown().is_active(now_ms)
    }

    pub fn remaining_cooldown_ms(&self, now_ms: u64) -> u64 {
        self.cooldown().remaining_ms(now_ms)
    }

    pub fn cooldown(&self) -> CooldownWindow {
        let last_fire_ms = get_timestamp(self.store.as_ref(), KEY_LAST_VIBRATION_TIME)
            .unwrap_or_else(|e| {
                warn!(error = %e, "unreadable last vibration time ignored");
                None
            });
        CooldownWindow {
            last_fire_ms,
            ..CooldownWindow::default()
        }
    }

    /// Side-effect free: not listening, not cooling down, sensor present.
    pub fn can_start(&self, sensor: &dyn SensorSource, now_ms: u64) -> bool {
        !self.is_active() && !self.is_in_cooldown(now_ms) && sensor.accelerometer().is_some()
    }

    pub fn status(&self, now_ms: u64) -> WatchModeStatus {
        WatchModeStatus {
            active: self.session.is_some(),
            start_time: self.session.map(|s| s.start_ms),
            duration_ms: self.session.map(|s| s.duration_ms),
            remaining_time_ms: self.session.map_or(0, |s| s.remaining_ms(now_ms)),
            in_cooldown: self.is_in_cooldown(now_ms),
            remaining_cooldown_ms: self.remaining_cooldown_ms(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Begin listening. On error nothing changes and no listener is registered.
    pub fn start(
        &mut self,
        sensor: &mut dyn SensorSource,
        duration: WatchDuration,
        now_ms: u64,
    ) -> Result<Event, DetectionError> {
        if self.session.is_some() {
            warn!("watch mode already active");
            return Err(DetectionError::AlreadyActive);
        }
        let remaining = self.remaining_cooldown_ms(now_ms);
        if remaining > 0 {
            warn!(remaining_ms = remaining, "watch mode start refused during cooldown");
            return Err(DetectionError::InCooldown {
                remaining_ms: remaining,
            });
        }
        let Some(kind) = sensor.accelerometer() else {
            warn!("no accelerometer for watch mode");
            return Err(DetectionError::SensorUnavailable);
        };
        sensor.subscribe()?;

        let session = WatchModeSession {
            id: Uuid::new_v4(),
            start_ms: now_ms,
            duration_ms: duration.as_ms(),
        };
        self.session = Some(session);
        self.last_processed_ms = None;
        self.countdown_halted = false;
        self.persist_session(&session);

        info!(
            session_id = %session.id,
            duration_ms = session.duration_ms,
            sensor = ?kind,
            "watch mode started"
        );
        Ok(Event::WatchModeStarted {
            session_id: session.id,
            duration_ms: session.duration_ms,
        })
    }

    /// End the current session. No-op (returns `None`) when idle.
    pub fn stop(&mut self, sensor: &mut dyn SensorSource, reason: StopReason) -> Option<Event> {
        let session = self.session.take()?;
        sensor.unsubscribe();
        self.clear_persisted_session();
        info!(session_id = %session.id, ?reason, "watch mode stopped");
        Some(Event::WatchModeStopped {
            session_id: session.id,
            reason,
        })
    }

    /// Stop any session and halt the countdown.
    pub fn cleanup(&mut self, sensor: &mut dyn SensorSource) -> Option<Event> {
        self.counting_down = false;
        self.countdown_halted = true;
        self.stop(sensor, StopReason::Cleanup)
    }

    /// Feed one sample. Returns `None` when idle or throttled.
    pub fn on_sample(
        &mut self,
        sensor: &mut dyn SensorSource,
        sample: &SensorSample,
        now_ms: u64,
    ) -> Option<WatchSample> {
        let session = self.session?;

        // The deadline already passed; the timeout wins.
        if now_ms >= session.deadline_ms() {
            let events = self.stop(sensor, StopReason::Timeout).into_iter().collect();
            return Some(WatchSample {
                magnitude: sample.linear_magnitude(),
                events,
            });
        }

        if let Some(last) = self.last_processed_ms {
            if now_ms.saturating_sub(last) < PROCESS_INTERVAL_MS {
                return None;
            }
        }
        self.last_processed_ms = Some(now_ms);

        let magnitude = sample.linear_magnitude();
        let events = if magnitude > self.threshold {
            self.fire(sensor, session, magnitude, now_ms)
        } else {
            Vec::new()
        };
        Some(WatchSample { magnitude, events })
    }

    /// Session timeout and cooldown countdown. A cooldown started by any
    /// recorded vibration is counted down here too.
    pub fn tick(&mut self, sensor: &mut dyn SensorSource, now_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(session) = self.session {
            if now_ms >= session.deadline_ms() {
                events.extend(self.stop(sensor, StopReason::Timeout));
            }
        }

        if self.countdown_halted {
            return events;
        }
        let cooldown = self.cooldown();
        if cooldown.is_active(now_ms) {
            if !self.counting_down {
                self.counting_down = true;
                debug!(remaining_ms = cooldown.remaining_ms(now_ms), "cooldown countdown started");
            }
            events.push(cooldown_event(cooldown, now_ms));
        } else if self.counting_down {
            self.counting_down = false;
            info!("watch mode cooldown ended");
            events.push(Event::CooldownEnded);
        }

        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fire(
        &mut self,
        sensor: &mut dyn SensorSource,
        session: WatchModeSession,
        magnitude: f32,
        now_ms: u64,
    ) -> Vec<Event> {
        info!(session_id = %session.id, magnitude, "watch mode tap fired");
        self.session = None;
        sensor.unsubscribe();
        self.clear_persisted_session();

        if let Err(e) = set_timestamp(self.store.as_ref(), KEY_LAST_VIBRATION_TIME, now_ms) {
            warn!(error = %e, "could not persist last vibration time");
        }
        self.counting_down = true;

        vec![
            Event::TimeVibrationTriggered {
                session_id: session.id,
            },
            Event::WatchModeStopped {
                session_id: session.id,
                reason: StopReason::VibrationTriggered,
            },
            cooldown_event(CooldownWindow::fired_at(now_ms), now_ms),
        ]
    }

    fn cooldown_tick(&self, now_ms: u64) -> Event {
        cooldown_event(self.cooldown(), now_ms)
    }

    fn persist_session(&self, session: &WatchModeSession) {
        let store = self.store.as_ref();
        let result = set_timestamp(store, KEY_WATCH_MODE_START_TIME, session.start_ms)
            .and_then(|()| set_timestamp(store, KEY_WATCH_MODE_DURATION, session.duration_ms));
        if let Err(e) = result {
            warn!(error = %e, "could not persist watch mode session");
        }
    }

    fn clear_persisted_session(&self) {
        for key in [KEY_WATCH_MODE_START_TIME, KEY_WATCH_MODE_DURATION] {
            if let Err(e) = self.store.remove(key) {
                debug!(key, error = %e, "could not clear watch mode key");
            }
        }
    }
}

fn cooldown_event(cooldown: CooldownWindow, now_ms: u64) -> Event {
    Event::CooldownTick {
        remaining_ms: cooldown.remaining_ms(now_ms),
        progress: cooldown.progress(now_ms),
    }
}
