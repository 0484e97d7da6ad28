//! Live mode: the service runs on the tokio driver with the system clock,
//! samples arrive as JSON lines on stdin, events leave as JSON lines on
//! stdout. Haptic commands are logged.

use std::io::BufRead;
use std::sync::Arc;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use vibtime_core::runtime;
use vibtime_core::watch_mode::WatchDuration;
use vibtime_core::{Config, HapticSink, SimulatedSensor, SystemClock, VibtimeService};

use super::{detection_mode, open_store, parse_sample_line, print_events, CliResult};

#[derive(Args)]
pub struct ListenArgs {
    /// Listen in watch mode for this long (10m or 2h) instead of traditional mode
    #[arg(long)]
    watch: Option<WatchDuration>,
    /// Keep state in memory instead of the database
    #[arg(long)]
    ephemeral: bool,
}

/// Vibrator stand-in that writes what it would play to the log.
struct LoggedHaptics;

impl HapticSink for LoggedHaptics {
    fn has_vibrator(&self) -> bool {
        true
    }

    fn play_one_shot(&mut self, duration_ms: u64) {
        info!(duration_ms, "one-shot");
    }

    fn play_waveform(&mut self, timings: &[u64]) {
        info!(?timings, "waveform");
    }
}

pub fn run(args: ListenArgs) -> CliResult {
    let config = Config::load_or_default();
    let store = open_store(args.ephemeral)?;
    let mut service = VibtimeService::new(
        &config,
        SimulatedSensor::wake_up(),
        LoggedHaptics,
        store,
        Arc::new(SystemClock),
    );
    print_events(&service.initialize())?;
    print_events(&service.start_or_report(detection_mode(args.watch)))?;
    if !service.is_running() {
        return Err("detection did not start".into());
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let handle = runtime::spawn(service);
        let mut events = handle.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let samples = handle.samples.clone();
        let reader = tokio::task::spawn_blocking(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_sample_line(&line) {
                    Ok(Some(sample)) => {
                        if samples.blocking_send(sample).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "skipping malformed sample"),
                }
            }
        });

        if let Err(e) = reader.await {
            warn!(error = %e, "stdin reader failed");
        }
        let service = handle.shutdown().await?;
        let _ = printer.await;
        info!(running = service.is_running(), "listen finished");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
