use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detector::DetectionMode;
use crate::pattern::EncodingMode;
use crate::safety::SafetyTick;
use crate::watch_mode::StopReason;

/// Every state change in the core produces an Event.
/// Observers (UI, notifications, the CLI) consume them in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Linear acceleration of an accepted (non-throttled) sample.
    AccelerationMeasured { magnitude: f32 },
    TapRegistered { count: u8, required: u8 },
    /// Partial sequence dropped (inter-tap timeout or stop).
    TapCountReset { required: u8 },
    SequenceCompleted,
    DetectionStarted { mode: DetectionMode },
    DetectionStopped,
    WatchModeStarted {
        session_id: Uuid,
        duration_ms: u64,
    },
    WatchModeStopped {
        session_id: Uuid,
        reason: StopReason,
    },
    TimeVibrationTriggered { session_id: Uuid },
    /// Emitted once per second while the watch-mode cooldown runs.
    CooldownTick { remaining_ms: u64, progress: f32 },
    CooldownEnded,
    /// A time pattern was handed to the haptic sink.
    TimeVibrationPlayed {
        hour: u32,
        minute: u32,
        mode: EncodingMode,
        timings: Vec<u64>,
    },
    SafetyTick(SafetyTick),
    /// The minimum inter-vibration interval has not yet elapsed.
    FrequencyLimit { remaining_ms: u64 },
    AutoStopWarning { remaining_ms: u64 },
    ServiceExpired,
    AutoStop,
    Error { message: String },
}

impl Event {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::AccelerationMeasured { .. } => "acceleration_measured",
            Event::TapRegistered { .. } => "tap_registered",
            Event::TapCountReset { .. } => "tap_count_reset",
            Event::SequenceCompleted => "sequence_completed",
            Event::DetectionStarted { .. } => "detection_started",
            Event::DetectionStopped => "detection_stopped",
            Event::WatchModeStarted { .. } => "watch_mode_started",
            Event::WatchModeStopped { .. } => "watch_mode_stopped",
            Event::TimeVibrationTriggered { .. } => "time_vibration_triggered",
            Event::CooldownTick { .. } => "cooldown_tick",
            Event::CooldownEnded => "cooldown_ended",
            Event::TimeVibrationPlayed { .. } => "time_vibration_played",
            Event::SafetyTick(_) => "safety_tick",
            Event::FrequencyLimit { .. } => "frequency_limit",
            Event::AutoStopWarning { .. } => "auto_stop_warning",
            Event::ServiceExpired => "service_expired",
            Event::AutoStop => "auto_stop",
            Event::Error { .. } => "error",
        }
    }
}
