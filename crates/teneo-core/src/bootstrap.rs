//! Session bootstrap: decide which identity the node runs as, then start it.

use std::time::Duration;
use tracing::{info, warn};

use crate::auth::{AccountRecord, AccountStore, AuthClient, SessionRefresher};
use crate::error::BootstrapError;
use crate::node::ConnectionManager;
use crate::storage::{PersistedState, StateStore};

/// How the identity is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChoice {
    /// Reuse the identity already in the state file.
    Stored,
    /// Password login against the identity provider.
    Login { email: String, password: String },
    /// A user id typed in by hand.
    Manual(String),
}

pub struct Bootstrap {
    store: StateStore,
    auth: AuthClient,
    accounts: Option<AccountStore>,
}

impl Bootstrap {
    pub fn new(store: StateStore, auth: AuthClient) -> Self {
        Self {
            store,
            auth,
            accounts: None,
        }
    }

    /// Keep login tokens in `accounts` and drop them on logout.
    pub fn with_accounts(mut self, accounts: AccountStore) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Identity in the state file, if any.
    pub fn stored_identity(&self) -> Result<Option<String>, BootstrapError> {
        let state = self.store.read()?;
        Ok(state.has_identity().then_some(state.identity))
    }

    /// Resolve `choice` to an identity. Login and manual identities are
    /// persisted before returning.
    pub async fn resolve(&self, choice: IdentityChoice) -> Result<String, BootstrapError> {
        match choice {
            IdentityChoice::Stored => self
                .stored_identity()?
                .ok_or(BootstrapError::NoStoredIdentity),
            IdentityChoice::Login { email, password } => {
                let session = self.auth.login(&email, &password).await?;
                let profile = self.auth.fetch_profile(&session).await?;
                self.persist_identity(&session.user_id)?;
                if let Some(accounts) = &self.accounts {
                    let record = AccountRecord::from_login(&email, &session, &profile);
                    if let Err(e) = accounts.save(&record) {
                        warn!(error = %e, "could not keep account tokens in the keyring");
                    }
                }
                Ok(session.user_id)
            }
            IdentityChoice::Manual(raw) => {
                let identity = raw.trim();
                if identity.is_empty() {
                    return Err(BootstrapError::EmptyIdentity);
                }
                self.persist_identity(identity)?;
                Ok(identity.to_string())
            }
        }
    }

    /// Start the reward ticker, then open the node connection.
    pub async fn activate(
        &self,
        manager: &ConnectionManager,
        identity: &str,
    ) -> Result<(), BootstrapError> {
        manager.rewards().start();
        manager.connect(identity).await?;
        Ok(())
    }

    /// Account saved by an earlier login for `identity`, if it carries a
    /// refresh token. An unreachable keyring counts as no account.
    pub fn saved_account(&self, identity: &str) -> Option<AccountRecord> {
        let accounts = self.accounts.as_ref()?;
        match accounts.load() {
            Ok(record) => record
                .filter(|r| r.user_id == identity && !r.refresh_token.is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read account tokens from the keyring");
                None
            }
        }
    }

    /// Start refreshing the saved session for `identity` every `period`.
    /// `None` when there is no saved account to refresh.
    pub fn start_session_refresh(
        &self,
        identity: &str,
        period: Duration,
    ) -> Option<SessionRefresher> {
        let record = self.saved_account(identity)?;
        let mut refresher = SessionRefresher::new(self.auth.clone(), period);
        if let Some(accounts) = &self.accounts {
            refresher = refresher.with_accounts(accounts.clone());
        }
        refresher.start(record);
        info!(%identity, "session refresh scheduled");
        Some(refresher)
    }

    /// Forget the identity and everything recorded for it. A keyring that
    /// cannot be reached is logged; the state file is still cleared.
    pub fn logout(&self) -> Result<(), BootstrapError> {
        self.store.clear()?;
        if let Some(accounts) = &self.accounts {
            if let Err(e) = accounts.delete() {
                warn!(error = %e, "could not remove account tokens from the keyring");
            }
        }
        info!("logged out");
        Ok(())
    }

    fn persist_identity(&self, identity: &str) -> Result<(), BootstrapError> {
        self.store.merge(PersistedState {
            identity: identity.to_string(),
            ..Default::default()
        })?;
        info!(%identity, "identity saved");
        Ok(())
    }
}
