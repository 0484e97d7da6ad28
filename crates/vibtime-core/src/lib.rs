//! # Vibtime Core Library
//!
//! Feel the time without looking at the screen: knock on the device and it
//! vibrates the current hour and minute. This library holds all of the
//! behavior; the CLI (and any platform shell) is a thin layer that delivers
//! sensor samples and plays haptic commands.
//!
//! ## Architecture
//!
//! - **Tap Classifier**: foreground multi-tap detection with throttling,
//!   debounce and a rolling tap window
//! - **Watch Mode**: bounded single-fire listening sessions followed by a
//!   15 minute cooldown
//! - **Safety Governor**: service runtime cap and minimum spacing between
//!   vibrations, with per-second progress ticks
//! - **Pattern Encoder**: decimal, binary and Morse renderings of a time
//! - **Storage**: key-value persistence (SQLite or in memory) and TOML
//!   configuration
//!
//! Every component is a wall-clock state machine that takes `now_ms`
//! explicitly and returns the [`Event`]s it produced. [`runtime`] drives a
//! [`VibtimeService`] from a tokio task.
//!
//! ## Key Components
//!
//! - [`VibtimeService`]: The assembled pipeline
//! - [`TapDetector`]: Traditional / watch-mode detection façade
//! - [`SafetyGovernor`]: Runtime and frequency limits
//! - [`encode`]: Time to [`VibrationPattern`]

pub mod clock;
pub mod detector;
pub mod error;
pub mod events;
pub mod haptics;
pub mod pattern;
pub mod runtime;
pub mod safety;
pub mod sensor;
pub mod service;
pub mod storage;
pub mod tap;
pub mod watch_mode;

pub use clock::{Clock, ManualClock, SystemClock};
pub use detector::{DetectionMode, DetectorInfo, TapDetector};
pub use error::{ConfigError, CoreError, DetectionError, StorageError, ValidationError};
pub use events::Event;
pub use haptics::{HapticCommand, HapticSink, RecordingHaptics};
pub use pattern::{encode, EncodingMode, Segment, VibrationPattern};
pub use safety::{SafetyGovernor, SafetyLimits, SafetyTick};
pub use sensor::{AccelerometerKind, SensorSample, SensorSource, SimulatedSensor};
pub use service::{ServiceStatus, VibtimeService};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use tap::{TapClassifier, TapEvent, TapSensitivity};
pub use watch_mode::{StopReason, WatchDuration, WatchModeManager, WatchModeStatus};
