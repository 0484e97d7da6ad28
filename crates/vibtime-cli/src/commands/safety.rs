use clap::Subcommand;
use serde::Serialize;
use vibtime_core::clock::now_ms;
use vibtime_core::safety::format_time;
use vibtime_core::{Config, SafetyGovernor, SafetyLimits, SafetyTick};

use super::{open_store, print_events, CliResult};

#[derive(Subcommand)]
pub enum SafetyAction {
    /// Show remaining service time and vibration interval
    Status {
        /// Evaluate against the test-mode limits regardless of config
        #[arg(long)]
        test_mode: bool,
    },
    /// Print the production and test-mode limits
    Limits,
    /// Forget the recorded service start and last vibration
    EmergencyStop,
}

#[derive(Serialize)]
struct SafetyReport {
    limits: SafetyLimits,
    service_start_time: Option<u64>,
    last_vibration_time: Option<u64>,
    expired: bool,
    can_trigger_vibration: bool,
    remaining_service: String,
    remaining_vibration_cooldown: String,
    #[serde(flatten)]
    tick: SafetyTick,
}

pub fn run(action: SafetyAction) -> CliResult {
    match action {
        SafetyAction::Status { test_mode } => {
            let config = Config::load_or_default();
            let limits = SafetyLimits::for_mode(test_mode || config.safety.test_mode);
            let governor = SafetyGovernor::new(open_store(false)?, limits);
            let now = now_ms();
            let tick = governor.snapshot(now);
            let report = SafetyReport {
                limits,
                service_start_time: governor.service_start_time(),
                last_vibration_time: governor.last_vibration_time(),
                expired: governor.is_service_expired(now),
                can_trigger_vibration: governor.can_trigger_vibration(now),
                remaining_service: format_time(tick.remaining_service_ms),
                remaining_vibration_cooldown: format_time(tick.remaining_vibration_cooldown_ms),
                tick,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SafetyAction::Limits => {
            let out = serde_json::json!({
                "production": SafetyLimits::production(),
                "test": SafetyLimits::test(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        SafetyAction::EmergencyStop => {
            let mut governor =
                SafetyGovernor::new(open_store(false)?, Config::load_or_default().safety_limits());
            print_events(&[governor.emergency_stop()])?;
        }
    }
    Ok(())
}
