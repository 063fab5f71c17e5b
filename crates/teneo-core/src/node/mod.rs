//! Node connection: transport seam, frames, liveness and lifecycle.

mod connection;
mod frame;
mod liveness;
mod reconnect;
mod transport;

pub use connection::{ConnectionManager, ConnectionState, NodeEndpoint, ReadEnd};
pub use frame::{InboundMessage, OutboundFrame};
pub use liveness::LivenessSignaler;
pub use reconnect::{supervise_reconnects, SupervisorExit};
pub use transport::{Dialer, FrameSink, FrameStream, LinkHandle, WebSocketDialer};
