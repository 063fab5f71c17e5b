mod config;
pub mod state;

pub use config::{AuthConfig, Config, NodeConfig, ReconnectConfig, RewardsConfig};
pub use state::{PersistedState, StateStore};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns `~/.config/teneo-node[-dev]/` based on TENEO_ENV.
///
/// Set TENEO_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TENEO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("teneo-node-dev")
    } else {
        base_dir.join("teneo-node")
    };

    std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
