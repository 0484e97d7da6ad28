//! Foreground multi-tap classifier.
//!
//! Feeds on one accelerometer sample at a time and decides when the user has
//! knocked the required number of times.
//!
//! ## Pipeline per sample
//!
//! ```text
//! disabled? -> drop
//! < 100 ms since last processed sample? -> drop
//! > 2000 ms since last tap with a partial count? -> reset count
//! magnitude > threshold and >= 300 ms since last tap? -> register tap
//! count == required? -> sequence completed, count back to 0
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sensitivity::TapSensitivity;
use crate::sensor::SensorSample;

/// Samples closer together than this are dropped unprocessed.
pub const PROCESS_INTERVAL_MS: u64 = 100;
/// Minimum gap between two registered taps.
pub const TAP_COOLDOWN_MS: u64 = 300;
/// A partial sequence is abandoned after this long without a tap.
pub const TAP_WINDOW_MS: u64 = 2000;

pub const MIN_TAP_COUNT: u8 = 1;
pub const MAX_TAP_COUNT: u8 = 5;
pub const DEFAULT_REQUIRED_TAP_COUNT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TapEvent {
    TapRegistered { count: u8, required: u8 },
    CountReset { required: u8 },
    SequenceCompleted,
}

/// Mutable counters owned by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapState {
    pub tap_count: u8,
    pub last_tap_ms: Option<u64>,
    pub last_processed_ms: Option<u64>,
}

/// Result of a sample that made it past the enable check and the throttle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub magnitude: f32,
    pub events: Vec<TapEvent>,
}

#[derive(Debug, Clone)]
pub struct TapClassifier {
    sensitivity: TapSensitivity,
    required_tap_count: u8,
    enabled: bool,
    state: TapState,
}

impl Default for TapClassifier {
    fn default() -> Self {
        Self::new(TapSensitivity::default(), DEFAULT_REQUIRED_TAP_COUNT)
    }
}

impl TapClassifier {
    /// `required_tap_count` is clamped to 1-5.
    pub fn new(sensitivity: TapSensitivity, required_tap_count: u8) -> Self {
        Self {
            sensitivity,
            required_tap_count: required_tap_count.clamp(MIN_TAP_COUNT, MAX_TAP_COUNT),
            enabled: false,
            state: TapState::default(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn sensitivity(&self) -> TapSensitivity {
        self.sensitivity
    }

    pub fn required_tap_count(&self) -> u8 {
        self.required_tap_count
    }

    pub fn tap_count(&self) -> u8 {
        self.state.tap_count
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_sensitivity(&mut self, sensitivity: TapSensitivity) {
        self.sensitivity = sensitivity;
        debug!(%sensitivity, "tap sensitivity set");
    }

    /// Returns the value actually applied after clamping.
    pub fn set_required_tap_count(&mut self, count: u8) -> u8 {
        self.required_tap_count = count.clamp(MIN_TAP_COUNT, MAX_TAP_COUNT);
        debug!(required = self.required_tap_count, "required tap count set");
        self.required_tap_count
    }

    pub fn start(&mut self) {
        self.enabled = true;
        self.state.last_processed_ms = None;
    }

    /// Disable and drop any partial sequence. Safe to call repeatedly.
    pub fn stop(&mut self) -> Option<TapEvent> {
        self.enabled = false;
        let reset = self.reset_count();
        self.state = TapState::default();
        reset
    }

    pub fn process_sample(&mut self, sample: &SensorSample, now_ms: u64) -> Option<SampleOutcome> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = self.state.last_processed_ms {
            if now_ms.saturating_sub(last) < PROCESS_INTERVAL_MS {
                return None;
            }
        }
        self.state.last_processed_ms = Some(now_ms);

        let magnitude = sample.linear_magnitude();
        let mut events = Vec::new();

        // Expire first so a late tap starts a fresh sequence instead of
        // completing a stale one.
        events.extend(self.expire_window(now_ms));

        if magnitude > self.sensitivity.threshold() {
            self.register_tap(now_ms, &mut events);
        }

        Some(SampleOutcome { magnitude, events })
    }

    /// Drop a partial sequence whose last tap is older than the tap window.
    pub fn expire_window(&mut self, now_ms: u64) -> Option<TapEvent> {
        match self.state.last_tap_ms {
            Some(last) if now_ms.saturating_sub(last) > TAP_WINDOW_MS => self.reset_count(),
            _ => None,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn register_tap(&mut self, now_ms: u64, events: &mut Vec<TapEvent>) {
        if let Some(last) = self.state.last_tap_ms {
            if now_ms.saturating_sub(last) < TAP_COOLDOWN_MS {
                return;
            }
        }

        self.state.tap_count += 1;
        self.state.last_tap_ms = Some(now_ms);
        debug!(
            count = self.state.tap_count,
            required = self.required_tap_count,
            "tap registered"
        );
        events.push(TapEvent::TapRegistered {
            count: self.state.tap_count,
            required: self.required_tap_count,
        });

        if self.state.tap_count >= self.required_tap_count {
            debug!("tap sequence completed");
            self.state.tap_count = 0;
            events.push(TapEvent::SequenceCompleted);
        }
    }

    fn reset_count(&mut self) -> Option<TapEvent> {
        if self.state.tap_count == 0 {
            return None;
        }
        debug!(dropped = self.state.tap_count, "tap count reset");
        self.state.tap_count = 0;
        Some(TapEvent::CountReset {
            required: self.required_tap_count,
        })
    }
}
