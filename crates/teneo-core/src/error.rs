//! Error types for teneo-core.
//!
//! Each component has its own error enum. [`BootstrapError`] wraps the
//! ones an identity resolution can hit.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing the persisted state record.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),

    /// A writer panicked while holding the store lock.
    #[error("State store lock poisoned")]
    Poisoned,
}

/// Errors on the node connection.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid node endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The peer side of the transport went away.
    #[error("Transport closed")]
    Closed,

    #[error("Not connected")]
    NotConnected,
}

/// Errors talking to the authentication and profile endpoints.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("User ID not found in login response")]
    MissingUserId,

    #[error("No saved account; log in first")]
    NoAccount,

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Failed to encode account data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors resolving an identity.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("No stored user ID; log in or enter one manually")]
    NoStoredIdentity,

    #[error("User ID must not be empty")]
    EmptyIdentity,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}
