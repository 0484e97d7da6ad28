mod classifier;
mod sensitivity;

pub use classifier::{
    SampleOutcome, TapClassifier, TapEvent, TapState, DEFAULT_REQUIRED_TAP_COUNT, MAX_TAP_COUNT,
    MIN_TAP_COUNT, PROCESS_INTERVAL_MS, TAP_COOLDOWN_MS, TAP_WINDOW_MS,
};
pub use sensitivity::TapSensitivity;
