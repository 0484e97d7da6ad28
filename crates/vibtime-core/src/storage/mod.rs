mod config;
pub mod database;
pub mod kv;
pub mod usage;

pub use config::{Config, DetectionConfig, PatternConfig, SafetyConfig};
pub use database::Database;
pub use kv::{KvStore, MemoryStore};

use std::path::PathBuf;

/// Returns `~/.config/vibtime[-dev]/` based on VIBTIME_ENV.
///
/// Set VIBTIME_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("VIBTIME_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("vibtime-dev")
    } else {
        base_dir.join("vibtime")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
