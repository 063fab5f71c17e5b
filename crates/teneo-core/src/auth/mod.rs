//! Identity provider access, keyring-held account tokens and their
//! periodic refresh.

mod account;
mod client;
mod refresh;

pub use account::{AccountRecord, AccountStore};
pub use client::{AuthClient, LoginSession, Profile};
pub use refresh::SessionRefresher;
