mod config;
pub mod database;
mod habit_store;
pub mod migrations;

pub use config::{Config, FocusConfig, NotificationsConfig, RulesConfig, UserConfig};
pub use database::Database;
pub use habit_store::{CheckInProgress, UndoOutcome};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/synitheia[-dev]/` based on SYNITHEIA_ENV.
///
/// Set SYNITHEIA_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SYNITHEIA_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("synitheia-dev")
    } else {
        base_dir.join("synitheia")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
