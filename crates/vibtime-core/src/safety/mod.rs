//! Service runtime cap and minimum spacing between vibrations.
//!
//! Independent of the watch-mode cooldown: the governor limits how long the
//! background service may run and how often any time vibration may play.

mod governor;

pub use governor::{format_time, SafetyGovernor, SafetyTick};

use serde::{Deserialize, Serialize};

use crate::clock::{MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND};

pub const MAX_SERVICE_RUNTIME_MS: u64 = 3 * MS_PER_HOUR;
pub const MIN_VIBRATION_INTERVAL_MS: u64 = 10 * MS_PER_MINUTE;
pub const AUTO_STOP_WARNING_MS: u64 = 15 * MS_PER_MINUTE;

pub const TEST_MAX_SERVICE_RUNTIME_MS: u64 = 5 * MS_PER_MINUTE;
pub const TEST_MIN_VIBRATION_INTERVAL_MS: u64 = 30 * MS_PER_SECOND;

/// The constants one governor runs with. Test mode shortens the runtime cap
/// and the interval; the warning threshold is the same in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    pub max_service_runtime_ms: u64,
    pub min_vibration_interval_ms: u64,
    pub warning_threshold_ms: u64,
}

impl SafetyLimits {
    pub fn production() -> Self {
        Self {
            max_service_runtime_ms: MAX_SERVICE_RUNTIME_MS,
            min_vibration_interval_ms: MIN_VIBRATION_INTERVAL_MS,
            warning_threshold_ms: AUTO_STOP_WARNING_MS,
        }
    }

    pub fn test() -> Self {
        Self {
            max_service_runtime_ms: TEST_MAX_SERVICE_RUNTIME_MS,
            min_vibration_interval_ms: TEST_MIN_VIBRATION_INTERVAL_MS,
            warning_threshold_ms: AUTO_STOP_WARNING_MS,
        }
    }

    pub fn for_mode(test_mode: bool) -> Self {
        if test_mode {
            Self::test()
        } else {
            Self::production()
        }
    }
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self::production()
    }
}
