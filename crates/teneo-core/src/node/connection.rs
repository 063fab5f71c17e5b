//! Connection manager: owns the single node connection.
//!
//! ## State Transitions
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected
//!                     |
//!                     +-> Disconnected (dial failed)
//! ```
//!
//! Reconnecting is a fresh `connect` call. The manager never reconnects on
//! its own: when the read loop ends the link stays "connected" until the
//! caller disconnects. How the loop ended is reported by
//! [`ConnectionManager::wait_reader_stopped`].

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::frame::{InboundMessage, OutboundFrame};
use super::liveness::LivenessSignaler;
use super::transport::{Dialer, FrameStream, LinkHandle, WebSocketDialer};
use crate::error::TransportError;
use crate::reward::RewardTicker;
use crate::storage::{Config, NodeConfig, PersistedState, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Node URL plus protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    base: String,
    version: String,
}

impl NodeEndpoint {
    pub fn new(base: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: version.into(),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.url.clone(), config.version.clone())
    }

    /// `<base>?userId=<identity>&version=<version>`, both values
    /// percent-encoded (a space becomes `%20`).
    pub fn url_for(&self, identity: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.base)?;
        let query = format!(
            "userId={}&version={}",
            urlencoding::encode(identity),
            urlencoding::encode(&self.version)
        );
        url.set_query(Some(&query));
        Ok(url)
    }
}

/// How a read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer finished the stream.
    Closed,
    /// A read failed; the connection was lost without a clean close.
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
struct ReaderStatus {
    epoch: u64,
    alive: bool,
    end: Option<ReadEnd>,
}

/// Returns the state to `Disconnected` when dropped before `commit`, which
/// covers both a failed dial and a `connect` future dropped mid-dial.
struct ConnectingGuard<'a> {
    state: &'a watch::Sender<ConnectionState>,
    committed: bool,
}

impl<'a> ConnectingGuard<'a> {
    fn enter(state: &'a watch::Sender<ConnectionState>) -> Self {
        state.send_replace(ConnectionState::Connecting);
        Self {
            state,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
        self.state.send_replace(ConnectionState::Connected);
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}

struct Inner {
    dialer: Arc<dyn Dialer>,
    endpoint: NodeEndpoint,
    store: StateStore,
    link: LinkHandle,
    state: watch::Sender<ConnectionState>,
    reader: Arc<watch::Sender<ReaderStatus>>,
    liveness: LivenessSignaler,
    rewards: RewardTicker,
}

/// Owns the connection handle and both timers. Clones share everything.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        endpoint: NodeEndpoint,
        store: StateStore,
        liveness: LivenessSignaler,
        rewards: RewardTicker,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (reader, _) = watch::channel(ReaderStatus::default());
        Self {
            inner: Arc::new(Inner {
                dialer,
                endpoint,
                store,
                link: LinkHandle::default(),
                state,
                reader: Arc::new(reader),
                liveness,
                rewards,
            }),
        }
    }

    /// WebSocket manager with endpoint and periods taken from `config`.
    pub fn from_config(config: &Config, store: StateStore) -> Self {
        let liveness = LivenessSignaler::new(store.clone(), config.node.ping_interval());
        let rewards = RewardTicker::new(
            store.clone(),
            config.rewards.tick_interval(),
            config.rewards.bonus_policy(),
        );
        Self::new(
            Arc::new(WebSocketDialer),
            NodeEndpoint::from_config(&config.node),
            store,
            liveness,
            rewards,
        )
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub async fn identity(&self) -> Option<String> {
        self.inner.link.identity().await
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    pub fn liveness(&self) -> &LivenessSignaler {
        &self.inner.liveness
    }

    pub fn rewards(&self) -> &RewardTicker {
        &self.inner.rewards
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Open the connection for `identity`. Succeeds without dialing when a
    /// connection already exists.
    ///
    /// On success the connect time becomes the heartbeat anchor, the
    /// liveness signaler and reward ticker start, and a read loop is
    /// spawned. On failure, or when the returned future is dropped before
    /// the dial completes, the state returns to `Disconnected`.
    pub async fn connect(&self, identity: &str) -> Result<(), TransportError> {
        let inner = &self.inner;
        // Held until the timers and reader are in place, so concurrent
        // connect/disconnect calls see either nothing or everything.
        let mut link = inner.link.0.lock().await;
        if link.is_connected() {
            debug!(%identity, "already connected; connect is a no-op");
            return Ok(());
        }

        let url = inner.endpoint.url_for(identity)?;
        let connecting = ConnectingGuard::enter(&inner.state);
        info!(%url, "connecting to node");

        let (sink, stream) = match inner.dialer.dial(&url).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!(error = %e, "node connection failed");
                return Err(e);
            }
        };
        link.sink = Some(sink);
        link.identity = Some(identity.to_string());
        connecting.commit();

        let connected_at = Utc::now();
        if let Err(e) = inner.store.merge(PersistedState {
            last_heartbeat_at: Some(connected_at),
            ..Default::default()
        }) {
            warn!(error = %e, "failed to record connection time");
        }
        info!(%connected_at, "node connected");

        inner.liveness.start(inner.link.clone());
        inner.rewards.start();

        let mut epoch = 0;
        inner.reader.send_modify(|status| {
            status.epoch += 1;
            status.alive = true;
            status.end = None;
            epoch = status.epoch;
        });
        tokio::spawn(read_loop(
            stream,
            inner.store.clone(),
            Arc::clone(&inner.reader),
            epoch,
        ));
        Ok(())
    }

    /// Write one frame on the current connection.
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        self.inner.link.send(frame).await
    }

    /// Close the transport, clear the link and stop the liveness signaler.
    /// No-op when not connected. The reward ticker keeps running.
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.0.lock().await;
        let Some(mut sink) = link.sink.take() else {
            return;
        };
        let identity = link.identity.take().unwrap_or_default();
        if let Err(e) = sink.close().await {
            debug!(error = %e, "error closing node transport");
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
        self.inner.liveness.stop();
        drop(link);
        info!(%identity, "node disconnected");
    }

    /// Termination: stop both timers, then close the connection.
    pub async fn shutdown(&self) {
        self.inner.rewards.stop();
        self.inner.liveness.stop();
        self.disconnect().await;
    }

    /// Resolves once the read loop of the latest connection has ended and
    /// reports how. Returns immediately if none is running; `None` means no
    /// read loop has ever run.
    pub async fn wait_reader_stopped(&self) -> Option<ReadEnd> {
        let mut rx = self.inner.reader.subscribe();
        // The sender lives as long as `self`, so this only ends on the predicate.
        let end = match rx.wait_for(|status| !status.alive).await {
            Ok(status) => status.end,
            Err(_) => None,
        };
        end
    }
}

async fn read_loop(
    mut stream: FrameStream,
    store: StateStore,
    reader: Arc<watch::Sender<ReaderStatus>>,
    epoch: u64,
) {
    let end = loop {
        match stream.next().await {
            Some(Ok(text)) => handle_frame(&store, &text),
            Some(Err(e)) => {
                warn!(error = %e, "node read failed; read loop stopped");
                break ReadEnd::Failed;
            }
            None => {
                info!("node closed the connection");
                break ReadEnd::Closed;
            }
        }
    };
    reader.send_if_modified(|status| {
        if status.epoch == epoch && status.alive {
            status.alive = false;
            status.end = Some(end);
            true
        } else {
            false
        }
    });
}

fn handle_frame(store: &StateStore, text: &str) {
    match InboundMessage::decode(text) {
        Ok(InboundMessage::Points { total, today }) => {
            info!(total, today, "points update from node");
            if let Err(e) = store.merge(PersistedState {
                last_heartbeat_at: Some(Utc::now()),
                points_total: total,
                points_today: today,
                ..Default::default()
            }) {
                warn!(error = %e, "failed to persist points update");
            }
        }
        Ok(InboundMessage::Unrecognized(value)) => {
            debug!(%value, "message from node");
        }
        Err(e) => warn!(error = %e, "undecodable frame from node"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_carries_identity_and_version() {
        let endpoint = NodeEndpoint::new("wss://secure.ws.teneo.pro/websocket", "v0.2");
        let url = endpoint.url_for("user-123").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://secure.ws.teneo.pro/websocket?userId=user-123&version=v0.2"
        );
    }

    #[test]
    fn endpoint_url_encodes_identity() {
        let endpoint = NodeEndpoint::new("wss://node.test/ws", "v0.2");
        let url = endpoint.url_for("a b&c=d").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://node.test/ws?userId=a%20b%26c%3Dd&version=v0.2"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let endpoint = NodeEndpoint::new("not a url", "v0.2");
        assert!(endpoint.url_for("x").is_err());
    }
}
