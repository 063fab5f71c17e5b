//! Reconnect supervision after a lost connection.

use tracing::{info, warn};

use super::connection::{ConnectionManager, ReadEnd};
use crate::storage::ReconnectConfig;

/// Why [`supervise_reconnects`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The node closed the stream cleanly; nothing to recover.
    PeerClosed,
    /// The next delay would have reached the configured maximum.
    GaveUp,
}

/// Watch the read loop and re-dial when it ends with an error, waiting
/// `policy.delay_for(attempt)` before each try. A clean close from the
/// peer is not retried. The attempt counter resets after each successful
/// reconnect.
pub async fn supervise_reconnects(
    manager: &ConnectionManager,
    identity: &str,
    policy: &ReconnectConfig,
) -> SupervisorExit {
    let mut attempt: u32 = 0;
    loop {
        match manager.wait_reader_stopped().await {
            Some(ReadEnd::Failed) => {}
            Some(ReadEnd::Closed) | None => {
                info!("node connection closed cleanly; not reconnecting");
                return SupervisorExit::PeerClosed;
            }
        }

        loop {
            attempt += 1;
            let Some(delay) = policy.delay_for(attempt) else {
                warn!(attempt, "giving up on reconnecting");
                return SupervisorExit::GaveUp;
            };
            warn!(attempt, delay_secs = delay.as_secs(), "node connection lost; reconnecting");
            tokio::time::sleep(delay).await;

            manager.disconnect().await;
            match manager.connect(identity).await {
                Ok(()) => {
                    info!(attempt, "reconnected");
                    attempt = 0;
                    break;
                }
                Err(e) => warn!(error = %e, attempt, "reconnect failed"),
            }
        }
    }
}
