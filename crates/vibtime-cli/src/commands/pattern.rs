use chrono::{Local, Timelike};
use clap::Args;
use vibtime_core::{encode, EncodingMode};

use super::CliResult;

#[derive(Args)]
pub struct PatternArgs {
    /// Hour 0-23 (defaults to the current local time)
    #[arg(requires = "minute")]
    hour: Option<u32>,
    /// Minute 0-59
    minute: Option<u32>,
    /// decimal, binary or morse (defaults to the configured mode)
    #[arg(long)]
    mode: Option<EncodingMode>,
    /// Print the merged off/on waveform instead of the segment durations
    #[arg(long)]
    waveform: bool,
    /// Print everything as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: PatternArgs) -> CliResult {
    let (hour, minute) = match (args.hour, args.minute) {
        (Some(h), Some(m)) => (h, m),
        _ => {
            let now = Local::now();
            (now.hour(), now.minute())
        }
    };
    let mode = args
        .mode
        .unwrap_or_else(|| vibtime_core::Config::load_or_default().pattern.mode);
    let pattern = encode(hour, minute, mode)?;

    if args.json {
        let out = serde_json::json!({
            "hour": hour,
            "minute": minute,
            "mode": mode,
            "segments": pattern.segments(),
            "durations": pattern.durations(),
            "waveform": pattern.waveform(),
            "pulses": pattern.pulse_count(),
            "total_ms": pattern.total_duration_ms(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let timings = if args.waveform {
        pattern.waveform()
    } else {
        pattern.durations()
    };
    let line: Vec<String> = timings.iter().map(u64::to_string).collect();
    println!("{}", line.join(" "));
    eprintln!(
        "{hour:02}:{minute:02} {mode}: {} pulses, {} ms",
        pattern.pulse_count(),
        pattern.total_duration_ms()
    );
    Ok(())
}
