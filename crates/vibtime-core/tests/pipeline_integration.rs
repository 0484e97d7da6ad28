//! End-to-end tests for the tap -> pattern -> haptics pipeline.
//!
//! Time is driven by a `ManualClock`; the sensor and vibrator are the
//! in-process recording doubles.

use std::sync::Arc;

use vibtime_core::clock::{MS_PER_MINUTE, MS_PER_SECOND};
use vibtime_core::haptics::HapticCommand;
use vibtime_core::sensor::GRAVITY_EARTH;
use vibtime_core::storage::usage;
use vibtime_core::{
    encode, Config, DetectionMode, EncodingMode, Event, ManualClock, MemoryStore,
    RecordingHaptics, SensorSample, SimulatedSensor, TapSensitivity, VibtimeService,
};

const T0: u64 = 1_700_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    service: VibtimeService<SimulatedSensor, RecordingHaptics>,
    clock: ManualClock,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new(config: Config) -> Self {
        let clock = ManualClock::new(T0);
        let store = Arc::new(MemoryStore::new());
        let mut service = VibtimeService::new(
            &config,
            SimulatedSensor::wake_up(),
            RecordingHaptics::new(),
            store.clone(),
            Arc::new(clock.clone()),
        );
        service.initialize();
        Self {
            service,
            clock,
            store,
        }
    }

    /// Advance the clock, then deliver a sample with the given linear magnitude.
    fn sample_after(&mut self, delta_ms: u64, magnitude: f32) -> Vec<Event> {
        self.clock.advance(delta_ms);
        let sample = SensorSample::new(self.clock_ms(), 0.0, GRAVITY_EARTH + magnitude, 0.0);
        self.service.handle_sample(&sample)
    }

    fn clock_ms(&self) -> u64 {
        self.service.now_ms()
    }
}

fn played_times(events: &[Event]) -> Vec<(u32, u32, Vec<u64>)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::TimeVibrationPlayed {
                hour,
                minute,
                timings,
                ..
            } => Some((*hour, *minute, timings.clone())),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Traditional detection
// ============================================================================

#[test]
fn three_knocks_play_the_local_time() {
    let mut config = Config::default();
    config.detection.required_tap_count = 3;
    config.pattern.mode = EncodingMode::Morse;
    let mut h = Harness::new(config);
    h.service.start(DetectionMode::Traditional).unwrap();

    let mut events = h.sample_after(0, 4.0);
    events.extend(h.sample_after(350, 4.0));
    events.extend(h.sample_after(350, 4.0));

    let taps: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            Event::TapRegistered { count, .. } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(taps, vec![1, 2, 3]);

    let played = played_times(&events);
    assert_eq!(played.len(), 1);
    let (hour, minute, timings) = &played[0];
    let expected = encode(*hour, *minute, EncodingMode::Morse).unwrap();
    assert_eq!(timings, &expected.waveform());

    let commands = h.service.haptics().played();
    assert_eq!(commands.len(), 4);
    assert!(commands[..3]
        .iter()
        .all(|c| *c == HapticCommand::OneShot { duration_ms: 50 }));

    assert_eq!(usage::total(h.store.as_ref()).unwrap(), 1);
}

#[test]
fn slow_knocks_never_complete_a_sequence() {
    let mut h = Harness::new(Config::default());
    h.service.start(DetectionMode::Traditional).unwrap();

    let mut events = h.sample_after(0, 4.0);
    for _ in 0..4 {
        events.extend(h.sample_after(2_500, 4.0));
    }

    assert!(!events.contains(&Event::SequenceCompleted));
    let resets = events
        .iter()
        .filter(|e| matches!(e, Event::TapCountReset { .. }))
        .count();
    assert_eq!(resets, 4);
    assert!(played_times(&events).is_empty());
}

#[test]
fn sensitivity_controls_what_counts_as_a_knock() {
    let mut config = Config::default();
    config.detection.sensitivity = TapSensitivity::Low;
    config.detection.required_tap_count = 1;
    let mut h = Harness::new(config);
    h.service.start(DetectionMode::Traditional).unwrap();

    assert!(h.sample_after(0, 3.0).is_empty());
    let events = h.sample_after(500, 4.5);
    assert!(events.contains(&Event::SequenceCompleted));
}

#[test]
fn frequency_limit_applies_across_sequences() {
    let mut config = Config::default();
    config.detection.required_tap_count = 1;
    let mut h = Harness::new(config);
    h.service.start(DetectionMode::Traditional).unwrap();

    assert_eq!(played_times(&h.sample_after(0, 4.0)).len(), 1);

    let blocked = h.sample_after(5 * MS_PER_MINUTE, 4.0);
    assert!(blocked.contains(&Event::FrequencyLimit {
        remaining_ms: 5 * MS_PER_MINUTE
    }));

    let allowed = h.sample_after(5 * MS_PER_MINUTE, 4.0);
    assert_eq!(played_times(&allowed).len(), 1);
    assert_eq!(usage::total(h.store.as_ref()).unwrap(), 2);
}

#[test]
fn throttled_samples_are_dropped_in_order() {
    let mut config = Config::default();
    config.detection.report_acceleration = true;
    let mut h = Harness::new(config);
    h.service.start(DetectionMode::Traditional).unwrap();

    let mut measured = 0;
    for _ in 0..20 {
        let events = h.sample_after(20, 0.5);
        measured += events
            .iter()
            .filter(|e| matches!(e, Event::AccelerationMeasured { .. }))
            .count();
    }
    // 20 samples 20 ms apart: one accepted per 100 ms.
    assert_eq!(measured, 4);
}

#[test]
fn status_snapshot_tracks_the_pipeline() {
    let mut h = Harness::new(Config::default());
    let idle = h.service.status();
    assert!(!idle.running);
    assert_eq!(idle.detection.mode, None);

    h.service.start(DetectionMode::Traditional).unwrap();
    h.sample_after(MS_PER_SECOND, 4.0);
    let status = h.service.status();
    assert!(status.running);
    assert_eq!(status.tap_count, 1);
    assert_eq!(status.detection.mode, Some(DetectionMode::Traditional));
    assert_eq!(status.safety.remaining_service_ms, 3 * 60 * MS_PER_MINUTE - MS_PER_SECOND);
    assert!(status.can_trigger_vibration);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["encoding"], "decimal");
}
