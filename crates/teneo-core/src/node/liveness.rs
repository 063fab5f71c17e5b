//! Periodic heartbeat over the active connection.

use chrono::Utc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::frame::OutboundFrame;
use super::transport::LinkHandle;
use crate::error::TransportError;
use crate::periodic::TaskSlot;
use crate::storage::{PersistedState, StateStore};

/// Sends `{"type":"PING"}` every period while the link is up and records
/// the send time. A failed send is logged and left for the next tick.
pub struct LivenessSignaler {
    store: StateStore,
    period: Duration,
    task: TaskSlot,
}

impl LivenessSignaler {
    pub fn new(store: StateStore, period: Duration) -> Self {
        Self {
            store,
            period,
            task: TaskSlot::default(),
        }
    }

    /// Start pinging through `link`. A running signaler is stopped first,
    /// so there is never more than one timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, link: LinkHandle) {
        self.stop();
        let store = self.store.clone();
        let period = self.period;
        self.task.replace(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                beat(&link, &store).await;
            }
        }));
        debug!(period_ms = self.period.as_millis() as u64, "liveness signaler started");
    }

    /// Idempotent; safe to call when never started.
    pub fn stop(&self) {
        if self.task.stop() {
            debug!("liveness signaler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

async fn beat(link: &LinkHandle, store: &StateStore) {
    match link.send(&OutboundFrame::Ping).await {
        Ok(()) => {
            let sent_at = Utc::now();
            trace!(%sent_at, "ping sent");
            if let Err(e) = store.merge(PersistedState {
                last_ping_sent_at: Some(sent_at),
                ..Default::default()
            }) {
                warn!(error = %e, "failed to record ping time");
            }
        }
        Err(TransportError::NotConnected) => trace!("ping skipped: not connected"),
        Err(e) => warn!(error = %e, "failed to send ping"),
    }
}
