//! Offline replay: sample timestamps drive a manual clock, ticks are
//! synthesized once per second of sample time, and events are printed as
//! JSON lines. Runs against an in-memory store so nothing persists.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use vibtime_core::clock::{ManualClock, MS_PER_SECOND};
use vibtime_core::safety::MAX_SERVICE_RUNTIME_MS;
use vibtime_core::watch_mode::WatchDuration;
use vibtime_core::{
    Clock, Config, EncodingMode, MemoryStore, RecordingHaptics, SimulatedSensor, TapSensitivity,
    VibtimeService,
};

use super::{detection_mode, print_events, read_samples, CliResult};

/// No timer the service keeps runs longer than the production runtime cap, so
/// a wider gap between samples is crossed with a single tick.
const MAX_CATCH_UP_MS: u64 = MAX_SERVICE_RUNTIME_MS;

type ReplayService = VibtimeService<SimulatedSensor, RecordingHaptics>;

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON-lines sample file ("-" for stdin)
    file: PathBuf,
    /// Listen in watch mode for this long (10m or 2h) instead of traditional mode
    #[arg(long)]
    watch: Option<WatchDuration>,
    /// Override the configured sensitivity (low, medium, high)
    #[arg(long)]
    sensitivity: Option<TapSensitivity>,
    /// Override the configured required tap count
    #[arg(long)]
    taps: Option<u8>,
    /// Override the configured encoding
    #[arg(long)]
    mode: Option<EncodingMode>,
    /// Use the short test-mode safety limits
    #[arg(long)]
    test_mode: bool,
    /// Keep ticking this many seconds after the last sample
    #[arg(long, default_value = "0")]
    tail_secs: u64,
    /// Emit acceleration magnitudes too
    #[arg(long)]
    acceleration: bool,
}

pub fn run(args: ReplayArgs) -> CliResult {
    let samples = if args.file.as_os_str() == "-" {
        read_samples(std::io::stdin().lock())?
    } else {
        read_samples(BufReader::new(File::open(&args.file)?))?
    };
    let Some(first) = samples.first() else {
        return Err("no samples in input".into());
    };

    let mut config = Config::load_or_default();
    if let Some(sensitivity) = args.sensitivity {
        config.detection.sensitivity = sensitivity;
    }
    if let Some(taps) = args.taps {
        config.detection.required_tap_count = taps;
    }
    if let Some(mode) = args.mode {
        config.pattern.mode = mode;
    }
    config.safety.test_mode |= args.test_mode;
    config.detection.report_acceleration |= args.acceleration;
    config.validate()?;

    let clock = ManualClock::new(first.timestamp_ms);
    let mut service = VibtimeService::new(
        &config,
        SimulatedSensor::wake_up(),
        RecordingHaptics::new(),
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
    );
    print_events(&service.initialize())?;
    print_events(&service.start_or_report(detection_mode(args.watch)))?;

    let mut next_tick = first.timestamp_ms + MS_PER_SECOND;
    for sample in &samples {
        tick_until(&mut service, &clock, &mut next_tick, sample.timestamp_ms)?;
        // A timestamp that goes backwards keeps the clock where it is.
        clock.set(sample.timestamp_ms.max(clock.now_ms()));
        print_events(&service.handle_sample(sample))?;
    }

    for _ in 0..args.tail_secs {
        clock.set(next_tick);
        print_events(&service.tick())?;
        next_tick += MS_PER_SECOND;
    }
    print_events(&service.stop())?;

    let played = service.haptics().played().len();
    tracing::info!(samples = samples.len(), played, "replay finished");
    Ok(())
}

/// Tick once per second of sample time up to `until`.
fn tick_until(
    service: &mut ReplayService,
    clock: &ManualClock,
    next_tick: &mut u64,
    until: u64,
) -> CliResult {
    let gap = until.saturating_sub(*next_tick);
    if gap > MAX_CATCH_UP_MS {
        let skipped = gap / MS_PER_SECOND;
        *next_tick += skipped * MS_PER_SECOND;
        tracing::debug!(skipped, "sample gap exceeds every timer, skipping ticks");
    }
    while *next_tick <= until {
        clock.set(*next_tick);
        print_events(&service.tick())?;
        *next_tick += MS_PER_SECOND;
    }
    Ok(())
}
