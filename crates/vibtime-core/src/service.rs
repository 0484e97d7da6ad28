//! The background vibration service.
//!
//! Wires the detector, the safety governor and the haptic sink together:
//!
//! ```text
//! sample -> TapDetector -> (sequence completed | watch-mode fire)
//!        -> governor gate -> encode local time -> HapticSink
//!        -> governor.record_vibration + usage counters
//! ```
//!
//! All methods return the events they produced, in order. The service is
//! single-owner; [`crate::runtime`] drives it from one task and publishes
//! [`ServiceStatus`] snapshots for readers on other threads.

use std::sync::Arc;

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::detector::{DetectionMode, DetectorInfo, TapDetector};
use crate::error::{DetectionError, ValidationError};
use crate::events::Event;
use crate::haptics::{self, HapticSink, TAP_FEEDBACK_MS};
use crate::pattern::{encode, EncodingMode};
use crate::safety::{SafetyGovernor, SafetyTick};
use crate::sensor::{SensorSample, SensorSource};
use crate::storage::{usage, Config, KvStore};
use crate::watch_mode::WatchModeStatus;

/// Everything a status display needs, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub now_ms: u64,
    pub running: bool,
    pub encoding: EncodingMode,
    pub detection: DetectorInfo,
    pub tap_count: u8,
    pub watch_mode: WatchModeStatus,
    pub safety: SafetyTick,
    pub can_trigger_vibration: bool,
    pub service_expired: bool,
    pub total_vibrations: i64,
    pub vibrations_today: i64,
}

pub struct VibtimeService<S: SensorSource, H: HapticSink> {
    detector: TapDetector<S>,
    governor: SafetyGovernor,
    haptics: H,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    encoding: EncodingMode,
    running: bool,
}

impl<S: SensorSource, H: HapticSink> VibtimeService<S, H> {
    pub fn new(
        config: &Config,
        sensor: S,
        haptics: H,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            detector: TapDetector::new(sensor, store.clone(), &config.detection),
            governor: SafetyGovernor::new(store.clone(), config.safety_limits()),
            haptics,
            store,
            clock,
            encoding: config.pattern.mode,
            running: false,
        }
    }

    /// Restore persisted cooldown state. Call once before `start`.
    pub fn initialize(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        self.detector.initialize(now)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn encoding(&self) -> EncodingMode {
        self.encoding
    }

    pub fn detector(&self) -> &TapDetector<S> {
        &self.detector
    }

    pub fn governor(&self) -> &SafetyGovernor {
        &self.governor
    }

    pub fn haptics(&self) -> &H {
        &self.haptics
    }

    pub fn status(&self) -> ServiceStatus {
        let now = self.clock.now_ms();
        let store = self.store.as_ref();
        ServiceStatus {
            now_ms: now,
            running: self.running,
            encoding: self.encoding,
            detection: self.detector.config_info(),
            tap_count: self.detector.classifier().tap_count(),
            watch_mode: self.detector.watch_mode().status(now),
            safety: self.governor.snapshot(now),
            can_trigger_vibration: self.governor.can_trigger_vibration(now),
            service_expired: self.governor.is_service_expired(now),
            total_vibrations: usage::total(store).unwrap_or_default(),
            vibrations_today: usage::today(store, now).unwrap_or_default(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn detector_mut(&mut self) -> &mut TapDetector<S> {
        &mut self.detector
    }

    pub fn set_encoding(&mut self, mode: EncodingMode) {
        self.encoding = mode;
    }

    /// Start detection in `mode`. The first successful start also starts
    /// the runtime cap. Nothing changes on error.
    pub fn start(&mut self, mode: DetectionMode) -> Result<Vec<Event>, DetectionError> {
        let now = self.clock.now_ms();
        let mut events = self.detector.start_detection(mode, now)?;
        if !self.running {
            self.running = true;
            self.governor.record_service_start(now);
            self.governor.start_monitoring();
            events.extend(self.governor.tick(now));
            info!(?mode, "service started");
        }
        Ok(events)
    }

    /// [`start`](Self::start), with a failure turned into an `Error` event.
    pub fn start_or_report(&mut self, mode: DetectionMode) -> Vec<Event> {
        match self.start(mode) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "detection start failed");
                vec![Event::Error {
                    message: e.to_string(),
                }]
            }
        }
    }

    /// Stop detection and monitoring. Safe to call repeatedly.
    pub fn stop(&mut self) -> Vec<Event> {
        let events = self.detector.stop_detection();
        self.governor.stop_monitoring();
        if self.running {
            self.running = false;
            info!("service stopped");
        }
        events
    }

    /// Release the sensor, forget the persisted runtime and vibration
    /// timestamps, and stop.
    pub fn emergency_stop(&mut self) -> Vec<Event> {
        let mut events = self.detector.cleanup();
        events.push(self.governor.emergency_stop());
        self.running = false;
        events
    }

    pub fn handle_sample(&mut self, sample: &SensorSample) -> Vec<Event> {
        let now = self.clock.now_ms();
        // Watch mode records its own fire time; the gate must see the state
        // from before this sample.
        let wait_ms = self.governor.remaining_vibration_cooldown_ms(now);

        let mut events = self.detector.on_sample(sample, now);
        let mut triggered = false;
        for event in &events {
            match event {
                Event::TapRegistered { .. } => {
                    haptics::pulse(&mut self.haptics, TAP_FEEDBACK_MS);
                }
                Event::SequenceCompleted | Event::TimeVibrationTriggered { .. } => triggered = true,
                _ => {}
            }
        }
        if triggered {
            events.extend(self.vibrate_current_time(now, wait_ms));
        }
        events
    }

    /// One-second housekeeping. Stops the service when the runtime cap is hit.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        let mut events = self.detector.tick(now);
        events.extend(self.governor.tick(now));

        if events.contains(&Event::ServiceExpired) {
            warn!("service runtime cap reached, stopping");
            events.extend(self.stop());
            events.push(Event::AutoStop);
        }
        events
    }

    /// Play `hour:minute` with the configured encoding, subject to the
    /// governor's inter-vibration interval.
    pub fn vibrate_time(&mut self, hour: u32, minute: u32) -> Result<Vec<Event>, ValidationError> {
        let now = self.clock.now_ms();
        let wait_ms = self.governor.remaining_vibration_cooldown_ms(now);
        self.play_time(hour, minute, now, wait_ms)
    }

    /// Single one-shot, ignoring every limit.
    pub fn test_vibration(&mut self, duration_ms: u64) -> bool {
        info!(duration_ms, "test vibration");
        haptics::pulse(&mut self.haptics, duration_ms)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn vibrate_current_time(&mut self, now: u64, wait_ms: u64) -> Vec<Event> {
        let local = usage::local_datetime(now);
        match self.play_time(local.hour(), local.minute(), now, wait_ms) {
            Ok(events) => events,
            Err(e) => vec![Event::Error {
                message: e.to_string(),
            }],
        }
    }

    fn play_time(
        &mut self,
        hour: u32,
        minute: u32,
        now: u64,
        wait_ms: u64,
    ) -> Result<Vec<Event>, ValidationError> {
        let pattern = encode(hour, minute, self.encoding)?;
        if wait_ms > 0 {
            info!(remaining_ms = wait_ms, "vibration refused by frequency limit");
            return Ok(vec![Event::FrequencyLimit {
                remaining_ms: wait_ms,
            }]);
        }

        if !haptics::play_pattern(&mut self.haptics, &pattern) {
            return Ok(vec![Event::Error {
                message: "device has no vibrator".into(),
            }]);
        }

        self.governor.record_vibration(now);
        if let Err(e) = usage::record(self.store.as_ref(), now) {
            warn!(error = %e, "could not update usage counters");
        }
        info!(hour, minute, mode = %self.encoding, "time vibration played");
        Ok(vec![Event::TimeVibrationPlayed {
            hour,
            minute,
            mode: self.encoding,
            timings: pattern.waveform(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, MS_PER_MINUTE, MS_PER_SECOND};
    use crate::haptics::{HapticCommand, RecordingHaptics};
    use crate::sensor::{SimulatedSensor, GRAVITY_EARTH};
    use crate::storage::kv::MemoryStore;

    const T0: u64 = 1_700_000_000_000;

    type TestService = VibtimeService<SimulatedSensor, RecordingHaptics>;

    fn service(config: Config) -> (TestService, ManualClock, Arc<MemoryStore>) {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryStore::new());
        let svc = VibtimeService::new(
            &config,
            SimulatedSensor::wake_up(),
            RecordingHaptics::new(),
            store.clone(),
            Arc::new(clock.clone()),
        );
        (svc, clock, store)
    }

    fn knock() -> SensorSample {
        SensorSample::new(0, 0.0, 0.0, GRAVITY_EARTH + 5.0)
    }

    #[test]
    fn completed_sequence_plays_time_pattern() {
        let (mut svc, clock, _) = service(Config::default());
        svc.start(DetectionMode::Traditional).unwrap();

        svc.handle_sample(&knock());
        clock.advance(400);
        let events = svc.handle_sample(&knock());

        assert!(events.contains(&Event::SequenceCompleted));
        assert!(matches!(events.last(), Some(Event::TimeVibrationPlayed { .. })));
        let played = svc.haptics().played();
        assert_eq!(played[0], HapticCommand::OneShot { duration_ms: 50 });
        assert_eq!(played[1], HapticCommand::OneShot { duration_ms: 50 });
        assert!(matches!(played[2], HapticCommand::Waveform { .. }));

        let status = svc.status();
        assert_eq!(status.total_vibrations, 1);
        assert_eq!(status.vibrations_today, 1);
        assert!(!status.can_trigger_vibration);
    }

    #[test]
    fn frequency_limit_blocks_second_pattern() {
        let (mut svc, clock, _) = service(Config::default());
        assert_eq!(svc.detector_mut().set_required_tap_count(1), 1);
        svc.start(DetectionMode::Traditional).unwrap();

        svc.handle_sample(&knock());
        clock.advance(MS_PER_MINUTE);
        let events = svc.handle_sample(&knock());
        assert_eq!(
            events.last(),
            Some(&Event::FrequencyLimit {
                remaining_ms: 9 * MS_PER_MINUTE
            })
        );
        assert_eq!(svc.haptics().waveforms().len(), 1);
    }

    #[test]
    fn watch_mode_fire_is_not_blocked_by_its_own_timestamp() {
        let (mut svc, clock, store) = service(Config::default());
        svc.start(DetectionMode::WatchMode {
            duration: crate::watch_mode::WatchDuration::TenMinutes,
        })
        .unwrap();
        clock.advance(MS_PER_SECOND);
        let events = svc.handle_sample(&knock());

        assert!(matches!(events[0], Event::TimeVibrationTriggered { .. }));
        assert!(matches!(events.last(), Some(Event::TimeVibrationPlayed { .. })));
        assert_eq!(
            store.get_i64(crate::storage::kv::KEY_LAST_VIBRATION_TIME).unwrap(),
            Some((T0 + MS_PER_SECOND) as i64)
        );
    }

    #[test]
    fn failed_start_reports_error_and_stays_stopped() {
        let clock = ManualClock::new(T0);
        let mut svc = VibtimeService::new(
            &Config::default(),
            SimulatedSensor::absent(),
            RecordingHaptics::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(clock),
        );
        let events = svc.start_or_report(DetectionMode::Traditional);
        assert!(matches!(events.as_slice(), [Event::Error { .. }]));
        assert!(!svc.is_running());
        assert!(svc.governor().service_start_time().is_none());
    }

    #[test]
    fn expiry_auto_stops_in_test_mode() {
        let mut config = Config::default();
        config.safety.test_mode = true;
        let (mut svc, clock, _) = service(config);
        svc.start(DetectionMode::Traditional).unwrap();

        clock.advance(5 * MS_PER_MINUTE);
        let events = svc.tick();
        assert!(events.contains(&Event::ServiceExpired));
        assert!(events.contains(&Event::DetectionStopped));
        assert_eq!(events.last(), Some(&Event::AutoStop));
        assert!(!svc.is_running());
        assert!(!svc.detector().sensor().is_subscribed());
        assert!(svc.tick().is_empty());
    }

    #[test]
    fn no_vibrator_skips_pattern() {
        let clock = ManualClock::new(T0);
        let mut svc = VibtimeService::new(
            &Config::default(),
            SimulatedSensor::wake_up(),
            RecordingHaptics::without_vibrator(),
            Arc::new(MemoryStore::new()),
            Arc::new(clock),
        );
        let events = svc.vibrate_time(14, 30).unwrap();
        assert!(matches!(events.as_slice(), [Event::Error { .. }]));
        assert!(svc.governor().can_trigger_vibration(T0));
        assert!(!svc.test_vibration(500));
    }

    #[test]
    fn vibrate_time_validates_range() {
        let (mut svc, _, _) = service(Config::default());
        assert!(svc.vibrate_time(24, 0).is_err());
        let events = svc.vibrate_time(14, 30).unwrap();
        match events.as_slice() {
            [Event::TimeVibrationPlayed { hour, minute, timings, .. }] => {
                assert_eq!((*hour, *minute), (14, 30));
                assert_eq!(timings[0], 100);
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn emergency_stop_releases_everything() {
        let (mut svc, _, store) = service(Config::default());
        svc.start(DetectionMode::Traditional).unwrap();
        let events = svc.emergency_stop();
        assert_eq!(events.last(), Some(&Event::AutoStop));
        assert!(!svc.is_running());
        assert!(!svc.detector().sensor().is_subscribed());
        assert_eq!(
            store.get_i64(crate::storage::kv::KEY_SERVICE_START_TIME).unwrap(),
            None
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut svc, _, _) = service(Config::default());
        svc.start(DetectionMode::Traditional).unwrap();
        assert_eq!(svc.stop(), vec![Event::DetectionStopped]);
        assert!(svc.stop().is_empty());
        assert!(!svc.governor().is_monitoring());
    }
}
