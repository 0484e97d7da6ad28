use vibtime_core::clock::now_ms;
use vibtime_core::storage::usage;
use vibtime_core::{Config, SafetyGovernor, WatchModeManager};

use super::{open_store, CliResult};

/// Persisted state as the service would see it on startup.
pub fn run() -> CliResult {
    let config = Config::load_or_default();
    let store = open_store(false)?;
    let now = now_ms();

    let watch = WatchModeManager::new(store.clone(), config.detection.watch_threshold);
    let governor = SafetyGovernor::new(store.clone(), config.safety_limits());

    let out = serde_json::json!({
        "now_ms": now,
        "config": config,
        "watch_mode": watch.status(now),
        "safety": governor.snapshot(now),
        "can_trigger_vibration": governor.can_trigger_vibration(now),
        "total_vibrations": usage::total(store.as_ref())?,
        "vibrations_today": usage::today(store.as_ref(), now)?,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
