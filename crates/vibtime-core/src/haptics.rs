//! Haptic output seam.
//!
//! The vibrator is a single exclusive device: a new submission replaces
//! whatever is playing, nothing is queued.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pattern::VibrationPattern;

/// Confirmation pulse played for every registered tap.
pub const TAP_FEEDBACK_MS: u64 = 50;

/// Default length of a manual test vibration.
pub const DEFAULT_TEST_VIBRATION_MS: u64 = 500;

pub trait HapticSink: Send {
    fn has_vibrator(&self) -> bool;

    fn play_one_shot(&mut self, duration_ms: u64);

    /// `timings` alternate off/on starting with an off delay; played once.
    fn play_waveform(&mut self, timings: &[u64]);
}

/// Play a one-shot if the device can vibrate. Returns whether it was played.
pub fn pulse(sink: &mut dyn HapticSink, duration_ms: u64) -> bool {
    if !sink.has_vibrator() {
        warn!(duration_ms, "device has no vibrator, skipping pulse");
        return false;
    }
    sink.play_one_shot(duration_ms);
    true
}

/// Hand a pattern to the sink as a waveform. Returns whether it was played.
pub fn play_pattern(sink: &mut dyn HapticSink, pattern: &VibrationPattern) -> bool {
    if !sink.has_vibrator() {
        warn!("device has no vibrator, skipping pattern");
        return false;
    }
    let timings = pattern.waveform();
    debug!(?timings, "playing vibration waveform");
    sink.play_waveform(&timings);
    true
}

/// What a [`RecordingHaptics`] was asked to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HapticCommand {
    OneShot { duration_ms: u64 },
    Waveform { timings: Vec<u64> },
}

/// Sink that records commands instead of vibrating.
#[derive(Debug, Clone)]
pub struct RecordingHaptics {
    has_vibrator: bool,
    played: Vec<HapticCommand>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self {
            has_vibrator: true,
            played: Vec::new(),
        }
    }

    pub fn without_vibrator() -> Self {
        Self {
            has_vibrator: false,
            played: Vec::new(),
        }
    }

    pub fn played(&self) -> &[HapticCommand] {
        &self.played
    }

    pub fn waveforms(&self) -> Vec<&[u64]> {
        self.played
            .iter()
            .filter_map(|c| match c {
                HapticCommand::Waveform { timings } => Some(timings.as_slice()),
                HapticCommand::OneShot { .. } => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.played.clear();
    }
}

impl Default for RecordingHaptics {
    fn default() -> Self {
        Self::new()
    }
}

impl HapticSink for RecordingHaptics {
    fn has_vibrator(&self) -> bool {
        self.has_vibrator
    }

    fn play_one_shot(&mut self, duration_ms: u64) {
        self.played.push(HapticCommand::OneShot { duration_ms });
    }

    fn play_waveform(&mut self, timings: &[u64]) {
        self.played.push(HapticCommand::Waveform {
            timings: timings.to_vec(),
        });
    }
}
