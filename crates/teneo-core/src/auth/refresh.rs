//! Background refresh of the saved account session.
//!
//! Only the refresh token is kept, never the password, so the periodic
//! re-login is a refresh-token grant.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::account::{AccountRecord, AccountStore};
use super::client::AuthClient;
use crate::error::AuthError;
use crate::periodic::TaskSlot;

pub struct SessionRefresher {
    auth: AuthClient,
    accounts: Option<AccountStore>,
    period: Duration,
    current: Arc<Mutex<Option<AccountRecord>>>,
    task: TaskSlot,
}

impl SessionRefresher {
    pub fn new(auth: AuthClient, period: Duration) -> Self {
        Self {
            auth,
            accounts: None,
            period,
            current: Arc::new(Mutex::new(None)),
            task: TaskSlot::default(),
        }
    }

    /// Write every refreshed record back to `accounts`.
    pub fn with_accounts(mut self, accounts: AccountStore) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Latest record, refreshed or as given to `start`.
    pub fn current(&self) -> Option<AccountRecord> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refresh the current record once, right now.
    pub async fn refresh_now(&self) -> Result<AccountRecord, AuthError> {
        let record = self.current().ok_or(AuthError::NoAccount)?;
        let fresh = refresh_record(&self.auth, &record).await?;
        keep(&self.current, self.accounts.as_ref(), &fresh);
        Ok(fresh)
    }

    /// Refresh `record` every period, first one period from now. A failed
    /// refresh is logged and retried on the next tick with the old token.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, record: AccountRecord) {
        self.stop();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(record);

        let auth = self.auth.clone();
        let accounts = self.accounts.clone();
        let current = Arc::clone(&self.current);
        let period = self.period;
        self.task.replace(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = current.lock().unwrap_or_else(PoisonError::into_inner).clone();
                let Some(record) = snapshot else {
                    continue;
                };
                match refresh_record(&auth, &record).await {
                    Ok(fresh) => keep(&current, accounts.as_ref(), &fresh),
                    Err(e) => warn!(error = %e, "session refresh failed"),
                }
            }
        }));
        debug!(period_secs = self.period.as_secs(), "session refresher started");
    }

    pub fn stop(&self) {
        if self.task.stop() {
            debug!("session refresher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

async fn refresh_record(
    auth: &AuthClient,
    record: &AccountRecord,
) -> Result<AccountRecord, AuthError> {
    let session = auth.refresh(&record.refresh_token).await?;
    let mut fresh = record.clone();
    fresh.access_token = session.access_token;
    if !session.refresh_token.is_empty() {
        fresh.refresh_token = session.refresh_token;
    }
    Ok(fresh)
}

fn keep(
    current: &Mutex<Option<AccountRecord>>,
    accounts: Option<&AccountStore>,
    fresh: &AccountRecord,
) {
    *current.lock().unwrap_or_else(PoisonError::into_inner) = Some(fresh.clone());
    if let Some(accounts) = accounts {
        if let Err(e) = accounts.save(fresh) {
            warn!(error = %e, "could not keep refreshed tokens in the keyring");
        }
    }
    info!(user_id = %fresh.user_id, "session refreshed");
}
