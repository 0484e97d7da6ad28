//! Bounded, single-fire background listening.
//!
//! A watch-mode session subscribes to the accelerometer for a fixed preset
//! duration. The first sample above the watch threshold fires a time
//! vibration and ends the session; a 15 minute cooldown then blocks new
//! sessions.

mod cooldown;
mod machine;

pub use cooldown::CooldownWindow;
pub use machine::{WatchModeManager, WatchModeSession, WatchModeStatus, WatchSample};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clock::{MS_PER_HOUR, MS_PER_MINUTE};
use crate::error::ValidationError;

/// Minimum time between a watch-mode fire and the next session start.
pub const COOLDOWN_PERIOD_MS: u64 = 15 * MS_PER_MINUTE;
/// Single-tap threshold used while listening (medium sensitivity).
pub const DEFAULT_WATCH_THRESHOLD: f32 = 2.5;

/// Session length presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchDuration {
    #[default]
    TenMinutes,
    TwoHours,
}

impl WatchDuration {
    pub fn as_ms(self) -> u64 {
        match self {
            WatchDuration::TenMinutes => 10 * MS_PER_MINUTE,
            WatchDuration::TwoHours => 2 * MS_PER_HOUR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WatchDuration::TenMinutes => "ten_minutes",
            WatchDuration::TwoHours => "two_hours",
        }
    }
}

impl fmt::Display for WatchDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchDuration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ten_minutes" | "10m" | "10min" => Ok(WatchDuration::TenMinutes),
            "two_hours" | "2h" => Ok(WatchDuration::TwoHours),
            other => Err(ValidationError::InvalidValue {
                field: "watch_duration".into(),
                message: format!("unknown duration '{other}' (expected 10m or 2h)"),
            }),
        }
    }
}

/// Why a watch-mode session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Timeout,
    Manual,
    VibrationTriggered,
    Cleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(WatchDuration::TenMinutes.as_ms(), 600_000);
        assert_eq!(WatchDuration::TwoHours.as_ms(), 7_200_000);
        assert_eq!(COOLDOWN_PERIOD_MS, 900_000);
    }

    #[test]
    fn duration_parses_short_forms() {
        assert_eq!("2h".parse::<WatchDuration>().unwrap(), WatchDuration::TwoHours);
        assert_eq!("10m".parse::<WatchDuration>().unwrap(), WatchDuration::TenMinutes);
        assert_eq!(
            "ten_minutes".parse::<WatchDuration>().unwrap(),
            WatchDuration::TenMinutes
        );
        assert!("forever".parse::<WatchDuration>().is_err());
    }

    #[test]
    fn stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::VibrationTriggered).unwrap();
        assert_eq!(json, "\"vibration_triggered\"");
    }
}
