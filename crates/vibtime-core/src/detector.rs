//! Tap detection façade.
//!
//! Owns the sensor and routes its samples to one of two detectors:
//!
//! - **Traditional**: the foreground multi-tap [`TapClassifier`], running
//!   until stopped.
//! - **Watch mode**: a bounded [`WatchModeManager`] session that fires on a
//!   single knock.
//!
//! Only one of them is listening at a time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DetectionError;
use crate::events::Event;
use crate::sensor::{AccelerometerKind, SensorSample, SensorSource};
use crate::storage::{DetectionConfig, KvStore};
use crate::tap::{TapClassifier, TapEvent, TapSensitivity};
use crate::watch_mode::{StopReason, WatchDuration, WatchModeManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    Traditional,
    WatchMode { duration: WatchDuration },
}

/// Current detector settings, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub mode: Option<DetectionMode>,
    pub running: bool,
    pub accelerometer: Option<AccelerometerKind>,
    pub sensitivity: TapSensitivity,
    pub threshold: f32,
    pub required_tap_count: u8,
    pub watch_threshold: f32,
    pub report_acceleration: bool,
}

impl From<TapEvent> for Event {
    fn from(event: TapEvent) -> Self {
        match event {
            TapEvent::TapRegistered { count, required } => Event::TapRegistered { count, required },
            TapEvent::CountReset { required } => Event::TapCountReset { required },
            TapEvent::SequenceCompleted => Event::SequenceCompleted,
        }
    }
}

pub struct TapDetector<S: SensorSource> {
    sensor: S,
    classifier: TapClassifier,
    watch: WatchModeManager,
    mode: Option<DetectionMode>,
    report_acceleration: bool,
}

impl<S: SensorSource> TapDetector<S> {
    pub fn new(sensor: S, store: Arc<dyn KvStore>, config: &DetectionConfig) -> Self {
        Self {
            sensor,
            classifier: TapClassifier::new(config.sensitivity, config.required_tap_count),
            watch: WatchModeManager::new(store, config.watch_threshold),
            mode: None,
            report_acceleration: config.report_acceleration,
        }
    }

    /// Restore the persisted watch-mode cooldown.
    pub fn initialize(&mut self, now_ms: u64) -> Vec<Event> {
        self.watch.initialize(now_ms).into_iter().collect()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_accelerometer_available(&self) -> bool {
        self.sensor.accelerometer().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.classifier.is_enabled() || self.watch.is_active()
    }

    /// The mode of the running detector, if any.
    pub fn mode(&self) -> Option<DetectionMode> {
        self.mode
    }

    pub fn classifier(&self) -> &TapClassifier {
        &self.classifier
    }

    pub fn watch_mode(&self) -> &WatchModeManager {
        &self.watch
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn can_start_watch_mode(&self, now_ms: u64) -> bool {
        !self.classifier.is_enabled() && self.watch.can_start(&self.sensor, now_ms)
    }

    pub fn config_info(&self) -> DetectorInfo {
        DetectorInfo {
            mode: self.mode,
            running: self.is_running(),
            accelerometer: self.sensor.accelerometer(),
            sensitivity: self.classifier.sensitivity(),
            threshold: self.classifier.sensitivity().threshold(),
            required_tap_count: self.classifier.required_tap_count(),
            watch_threshold: self.watch.threshold(),
            report_acceleration: self.report_acceleration,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_sensitivity(&mut self, sensitivity: TapSensitivity) {
        self.classifier.set_sensitivity(sensitivity);
    }

    /// Clamped to 1-5; returns the applied value.
    pub fn set_required_tap_count(&mut self, count: u8) -> u8 {
        self.classifier.set_required_tap_count(count)
    }

    pub fn set_watch_threshold(&mut self, threshold: f32) {
        self.watch.set_threshold(threshold);
    }

    pub fn set_report_acceleration(&mut self, enabled: bool) {
        self.report_acceleration = enabled;
    }

    /// Start listening in `mode`. On error nothing changes.
    pub fn start_detection(
        &mut self,
        mode: DetectionMode,
        now_ms: u64,
    ) -> Result<Vec<Event>, DetectionError> {
        if self.is_running() {
            return Err(DetectionError::AlreadyActive);
        }

        let mut events = Vec::new();
        match mode {
            DetectionMode::Traditional => {
                if !self.is_accelerometer_available() {
                    return Err(DetectionError::SensorUnavailable);
                }
                self.sensor.subscribe()?;
                self.classifier.start();
                events.push(Event::DetectionStarted { mode });
            }
            DetectionMode::WatchMode { duration } => {
                let started = self.watch.start(&mut self.sensor, duration, now_ms)?;
                events.push(Event::DetectionStarted { mode });
                events.push(started);
            }
        }
        self.mode = Some(mode);
        info!(?mode, "detection started");
        Ok(events)
    }

    /// Stop whichever detector runs. Returns nothing when already stopped.
    pub fn stop_detection(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.classifier.is_enabled() {
            events.extend(self.classifier.stop().map(Event::from));
            self.sensor.unsubscribe();
        }
        events.extend(self.watch.stop(&mut self.sensor, StopReason::Manual));
        if self.mode.take().is_some() {
            info!("detection stopped");
            events.push(Event::DetectionStopped);
        }
        events
    }

    /// Stop detection and the cooldown countdown; the sensor is released.
    pub fn cleanup(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.classifier.is_enabled() {
            events.extend(self.classifier.stop().map(Event::from));
        }
        events.extend(self.watch.cleanup(&mut self.sensor));
        self.sensor.unsubscribe();
        if self.mode.take().is_some() {
            events.push(Event::DetectionStopped);
        }
        events
    }

    pub fn on_sample(&mut self, sample: &SensorSample, now_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();
        if self.classifier.is_enabled() {
            if let Some(outcome) = self.classifier.process_sample(sample, now_ms) {
                if self.report_acceleration {
                    events.push(Event::AccelerationMeasured {
                        magnitude: outcome.magnitude,
                    });
                }
                events.extend(outcome.events.into_iter().map(Event::from));
            }
        } else if let Some(outcome) = self.watch.on_sample(&mut self.sensor, sample, now_ms) {
            if self.report_acceleration {
                events.push(Event::AccelerationMeasured {
                    magnitude: outcome.magnitude,
                });
            }
            events.extend(outcome.events);
            self.note_watch_end(&mut events);
        }
        events
    }

    /// Tap-window expiry, watch-mode deadline and cooldown countdown.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .classifier
            .expire_window(now_ms)
            .map(Event::from)
            .into_iter()
            .collect();
        events.extend(self.watch.tick(&mut self.sensor, now_ms));
        self.note_watch_end(&mut events);
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// A watch session that ended by itself also ends detection.
    fn note_watch_end(&mut self, events: &mut Vec<Event>) {
        let ended = events
            .iter()
            .any(|e| matches!(e, Event::WatchModeStopped { .. }));
        if ended && matches!(self.mode, Some(DetectionMode::WatchMode { .. })) {
            self.mode = None;
            debug!("watch mode session ended detection");
            events.push(Event::DetectionStopped);
        }
    }
}
