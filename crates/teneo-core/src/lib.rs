//! # Teneo Node Core Library
//!
//! Client-side logic for running a Teneo community node: one persistent
//! WebSocket connection to the node service, a liveness ping, a local
//! reward estimate and a small JSON state file shared by all of them.
//! The `teneo-cli` binary is a thin shell over this crate.
//!
//! ## Architecture
//!
//! - **Node**: connection manager, inbound frame decoding and the liveness
//!   signaler, behind a [`Dialer`] seam for the transport
//! - **Reward**: pure estimator plus the once-per-second ticker that
//!   persists it
//! - **Storage**: the `localStorage.json` state file and the TOML config
//! - **Auth / Bootstrap**: password login, session refresh, manual or
//!   stored identity, and the start-up sequence
//!
//! ## Key Components
//!
//! - [`ConnectionManager`]: owns the connection and both timers
//! - [`StateStore`]: serialized read/merge access to the state file
//! - [`Bootstrap`]: identity resolution and activation
//! - [`Config`]: application configuration management

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod node;
mod periodic;
pub mod reward;
pub mod storage;

pub use auth::{AccountRecord, AccountStore, AuthClient, LoginSession, Profile, SessionRefresher};
pub use bootstrap::{Bootstrap, IdentityChoice};
pub use error::{AuthError, BootstrapError, ConfigError, StorageError, TransportError};
pub use node::{
    supervise_reconnects, ConnectionManager, ConnectionState, Dialer, InboundMessage,
    LivenessSignaler, NodeEndpoint, OutboundFrame, ReadEnd, SupervisorExit,
};
pub use reward::{estimate, BonusPolicy, RewardEstimate, RewardTicker};
pub use storage::{Config, PersistedState, StateStore};
