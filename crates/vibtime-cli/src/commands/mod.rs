pub mod config;
pub mod listen;
pub mod pattern;
pub mod replay;
pub mod safety;
pub mod status;

use std::io::BufRead;
use std::sync::Arc;

use vibtime_core::watch_mode::WatchDuration;
use vibtime_core::{Database, DetectionMode, Event, KvStore, MemoryStore, SensorSample};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// The persistent database, or a throwaway in-memory store.
pub fn open_store(ephemeral: bool) -> Result<Arc<dyn KvStore>, Box<dyn std::error::Error>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(Database::open()?))
}

/// `--watch <DURATION>` selects watch mode, otherwise traditional.
pub fn detection_mode(watch: Option<WatchDuration>) -> DetectionMode {
    match watch {
        Some(duration) => DetectionMode::WatchMode { duration },
        None => DetectionMode::Traditional,
    }
}

/// One sample per line as JSON: `{"timestamp_ms":0,"x":0.0,"y":0.0,"z":9.8}`.
/// Blank lines and `#` comments are skipped.
pub fn parse_sample_line(line: &str) -> Result<Option<SensorSample>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

pub fn read_samples(reader: impl BufRead) -> Result<Vec<SensorSample>, Box<dyn std::error::Error>> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_sample_line(&line) {
            Ok(Some(sample)) => samples.push(sample),
            Ok(None) => {}
            Err(e) => return Err(format!("line {}: {e}", index + 1).into()),
        }
    }
    Ok(samples)
}

/// Events go to stdout as JSON lines.
pub fn print_events(events: &[Event]) -> CliResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
