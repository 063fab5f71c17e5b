pub mod config;
pub mod logout;
pub mod run;
pub mod status;

use std::path::PathBuf;
use teneo_core::{
    AccountStore, AuthClient, Bootstrap, Config, ConfigError, StateStore, StorageError,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// File locations shared by every command.
pub struct Context {
    pub state_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

impl Context {
    pub fn store(&self) -> Result<StateStore, StorageError> {
        match &self.state_file {
            Some(path) => Ok(StateStore::at(path)),
            None => StateStore::open(),
        }
    }

    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.config_file {
            Some(path) => Ok(path.clone()),
            None => Config::path(),
        }
    }

    pub fn load_config(&self) -> Result<Config, ConfigError> {
        match &self.config_file {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }

    pub fn bootstrap(&self, config: &Config, store: StateStore) -> Bootstrap {
        Bootstrap::new(store, AuthClient::new(&config.auth)).with_accounts(AccountStore::default())
    }
}
