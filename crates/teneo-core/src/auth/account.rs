//! Account tokens kept in the OS keyring, never in the state file.

use serde::{Deserialize, Serialize};

use super::client::{LoginSession, Profile};
use crate::error::AuthError;

const SERVICE: &str = "teneo-node";
const ACCOUNT_KEY: &str = "account";

/// What a login leaves behind for later sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub user_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_code: Option<String>,
}

impl AccountRecord {
    pub fn from_login(email: &str, session: &LoginSession, profile: &Profile) -> Self {
        Self {
            email: email.to_string(),
            user_id: session.user_id.clone(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            personal_code: profile.personal_code.clone(),
        }
    }
}

/// Thin wrapper around the OS keyring entry holding the account record.
#[derive(Debug, Clone)]
pub struct AccountStore {
    service: String,
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new(SERVICE)
    }
}

impl AccountStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, AuthError> {
        Ok(keyring::Entry::new(&self.service, ACCOUNT_KEY)?)
    }

    pub fn load(&self) -> Result<Option<AccountRecord>, AuthError> {
        match self.entry()?.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, record: &AccountRecord) -> Result<(), AuthError> {
        let json = serde_json::to_string(record)?;
        self.entry()?.set_password(&json)?;
        Ok(())
    }

    /// Idempotent.
    pub fn delete(&self) -> Result<(), AuthError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
