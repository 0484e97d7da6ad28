//! Async driver for [`VibtimeService`].
//!
//! One task owns the service. Sensor samples arrive on an `mpsc` channel, a
//! one-second interval drives `tick`, every event is broadcast, and a fresh
//! [`ServiceStatus`] is published on a `watch` channel after each step so
//! readers on other threads never touch the service itself.
//!
//! The loop ends when the sample channel closes (the service is stopped
//! first) or when the safety governor auto-stops the service.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::Event;
use crate::haptics::HapticSink;
use crate::sensor::{SensorSample, SensorSource};
use crate::service::{ServiceStatus, VibtimeService};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 256;
const SAMPLE_CAPACITY: usize = 64;

/// Handles to a service running on its own task.
pub struct ServiceHandle<S: SensorSource, H: HapticSink> {
    pub samples: mpsc::Sender<SensorSample>,
    pub status: watch::Receiver<ServiceStatus>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<VibtimeService<S, H>>,
}

impl<S, H> ServiceHandle<S, H>
where
    S: SensorSource + 'static,
    H: HapticSink + 'static,
{
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Close the sample channel and wait for the loop to hand the service back.
    pub async fn shutdown(self) -> Result<VibtimeService<S, H>, tokio::task::JoinError> {
        drop(self.samples);
        self.task.await
    }
}

/// Spawn [`run`] on the current runtime.
pub fn spawn<S, H>(service: VibtimeService<S, H>) -> ServiceHandle<S, H>
where
    S: SensorSource + 'static,
    H: HapticSink + 'static,
{
    let (sample_tx, sample_rx) = mpsc::channel(SAMPLE_CAPACITY);
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let (status_tx, status_rx) = watch::channel(service.status());
    let task = tokio::spawn(run(service, sample_rx, event_tx.clone(), status_tx));
    ServiceHandle {
        samples: sample_tx,
        status: status_rx,
        events: event_tx,
        task,
    }
}

/// Drive `service` until the sample stream ends or the service auto-stops.
/// Returns the service so callers can inspect its final state.
pub async fn run<S, H>(
    mut service: VibtimeService<S, H>,
    mut samples: mpsc::Receiver<SensorSample>,
    events: broadcast::Sender<Event>,
    status: watch::Sender<ServiceStatus>,
) -> VibtimeService<S, H>
where
    S: SensorSource,
    H: HapticSink,
{
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    info!("service loop started");
    loop {
        let (produced, finished) = tokio::select! {
            sample = samples.recv() => match sample {
                Some(sample) => (service.handle_sample(&sample), false),
                None => {
                    debug!("sample channel closed");
                    (service.stop(), true)
                }
            },
            _ = interval.tick() => {
                let produced = service.tick();
                let auto_stopped = produced.contains(&Event::AutoStop);
                (produced, auto_stopped)
            }
        };

        for event in produced {
            debug!(kind = event.kind(), "event");
            // No subscribers is fine.
            let _ = events.send(event);
        }
        status.send_replace(service.status());

        if finished {
            break;
        }
    }
    info!("service loop finished");
    service
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{ManualClock, MS_PER_MINUTE};
    use crate::detector::DetectionMode;
    use crate::haptics::RecordingHaptics;
    use crate::sensor::{SimulatedSensor, GRAVITY_EARTH};
    use crate::storage::kv::MemoryStore;
    use crate::storage::Config;

    const T0: u64 = 1_700_000_000_000;

    fn started_service(
        config: &Config,
        clock: &ManualClock,
    ) -> VibtimeService<SimulatedSensor, RecordingHaptics> {
        let mut svc = VibtimeService::new(
            config,
            SimulatedSensor::wake_up(),
            RecordingHaptics::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
        );
        svc.initialize();
        svc.start(DetectionMode::Traditional).unwrap();
        svc
    }

    #[tokio::test(start_paused = true)]
    async fn samples_flow_to_events_and_status() {
        let clock = ManualClock::new(T0);
        let handle = spawn(started_service(&Config::default(), &clock));
        let mut events = handle.subscribe();
        let mut status = handle.status.clone();

        handle
            .samples
            .send(SensorSample::new(0, 0.0, 0.0, GRAVITY_EARTH + 5.0))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            Event::TapRegistered {
                count: 1,
                required: 2
            }
        );
        status.changed().await.unwrap();
        assert_eq!(status.borrow().tap_count, 1);

        let svc = handle.shutdown().await.unwrap();
        assert!(!svc.is_running());
        assert!(!svc.detector().sensor().is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ends_on_auto_stop() {
        let mut config = Config::default();
        config.safety.test_mode = true;
        let clock = ManualClock::new(T0);
        let handle = spawn(started_service(&config, &clock));
        let mut events = handle.subscribe();

        clock.advance(5 * MS_PER_MINUTE);
        loop {
            if events.recv().await.unwrap() == Event::AutoStop {
                break;
            }
        }
        let ServiceHandle { task, samples, .. } = handle;
        let svc = task.await.unwrap();
        drop(samples);
        assert!(!svc.is_running());
    }
}
