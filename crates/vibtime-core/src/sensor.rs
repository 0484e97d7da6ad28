//! Accelerometer seam.
//!
//! The platform delivers samples however it likes (callback, channel, file
//! replay); the core only needs to know whether an accelerometer exists and
//! to switch the subscription on and off.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DetectionError;

/// Standard gravity in m/s².
pub const GRAVITY_EARTH: f32 = 9.80665;

/// One 3-axis accelerometer reading, m/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp_ms: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SensorSample {
    pub fn new(timestamp_ms: u64, x: f32, y: f32, z: f32) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            z,
        }
    }

    /// Vector magnitude minus gravity: the device's own acceleration.
    /// Negative while in free fall.
    pub fn linear_magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt() - GRAVITY_EARTH
    }
}

/// Which accelerometer backs the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelerometerKind {
    /// Keeps delivering while the device sleeps.
    WakeUp,
    Regular,
}

/// Best-available accelerometer.
///
/// `unsubscribe` must be a no-op when nothing is registered.
pub trait SensorSource: Send {
    fn accelerometer(&self) -> Option<AccelerometerKind>;

    fn subscribe(&mut self) -> Result<(), DetectionError>;

    fn unsubscribe(&mut self);

    fn is_subscribed(&self) -> bool;
}

/// In-process sensor used by sample replays and tests.
///
/// Samples are pushed by the caller; this type only tracks the subscription
/// and counts register/unregister calls.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    kind: Option<AccelerometerKind>,
    subscribed: bool,
    refuse_registration: bool,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
}

impl SimulatedSensor {
    pub fn new(kind: Option<AccelerometerKind>) -> Self {
        Self {
            kind,
            subscribed: false,
            refuse_registration: false,
            subscribe_calls: 0,
            unsubscribe_calls: 0,
        }
    }

    /// Device with a wake-up accelerometer.
    pub fn wake_up() -> Self {
        Self::new(Some(AccelerometerKind::WakeUp))
    }

    /// Device without any accelerometer.
    pub fn absent() -> Self {
        Self::new(None)
    }

    /// Make every subsequent `subscribe` fail.
    pub fn refusing_registration(mut self) -> Self {
        self.refuse_registration = true;
        self
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls
    }

    /// Unsubscribes that actually released a listener.
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::wake_up()
    }
}

impl SensorSource for SimulatedSensor {
    fn accelerometer(&self) -> Option<AccelerometerKind> {
        self.kind
    }

    fn subscribe(&mut self) -> Result<(), DetectionError> {
        self.subscribe_calls += 1;
        if self.kind.is_none() {
            return Err(DetectionError::SensorUnavailable);
        }
        if self.refuse_registration {
            warn!("simulated sensor refused registration");
            return Err(DetectionError::RegistrationFailed(
                "listener rejected by sensor".into(),
            ));
        }
        self.subscribed = true;
        debug!(kind = ?self.kind, "sensor subscribed");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if self.subscribed {
            self.subscribed = false;
            self.unsubscribe_calls += 1;
            debug!("sensor unsubscribed");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}
