//! Transport Abstraction
//!
//! The external relay/session service is modelled as a [`Transport`]: a
//! driver that owns a set of connections, each with its own FIFO event
//! queue. Everything is non-blocking and polled from a single tick loop.
//!
//! Implementations: [`super::memory`] (in-process relay) and
//! [`super::tcp`] (length-framed TCP).

use std::fmt;

use thiserror::Error;

use super::protocol::CodecError;

/// Opaque per-connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Something that happened on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete message.
    Data(Vec<u8>),
    /// The remote side accepted us.
    Connected,
    /// The connection is gone.
    Disconnected,
}

/// Non-blocking, connection-oriented message transport.
pub trait Transport {
    /// Claim the local endpoint.
    fn bind(&mut self) -> Result<(), TransportError>;

    /// Start accepting inbound connections.
    fn listen(&mut self) -> Result<(), TransportError>;

    /// Open the connection to the host.
    fn connect(&mut self) -> Result<ConnectionId, TransportError>;

    /// Pump I/O and keep-alives. Called once per tick before polling.
    fn update(&mut self);

    /// Accept one pending inbound connection.
    fn accept(&mut self) -> Option<ConnectionId>;

    /// Whether `conn` is still a live handle.
    fn is_created(&self, conn: ConnectionId) -> bool;

    /// Pop the oldest queued event for `conn`.
    fn pop_event(&mut self, conn: ConnectionId) -> Option<TransportEvent>;

    /// Queue one message for `conn`. Never panics.
    fn send(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError>;

    /// Close `conn` from this side.
    fn disconnect(&mut self, conn: ConnectionId);
}

/// Session setup failures. Fatal for the room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not claim the endpoint.
    #[error("bind failed: {0}")]
    Bind(String),

    /// Could not start listening.
    #[error("listen failed: {0}")]
    Listen(String),

    /// Could not reach the host.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Operation makes no sense for this side of the transport.
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),
}

/// Per-send failures. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// No such connection.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// Connection not accepted yet.
    #[error("connection {0} is not established")]
    NotConnected(ConnectionId),

    /// Connection already closed.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// Outbound buffer is full.
    #[error("send buffer full for {0}")]
    WouldBlock(ConnectionId),

    /// Lower-level write failure.
    #[error("send to {conn} failed: {reason}")]
    Io {
        /// Target connection.
        conn: ConnectionId,
        /// Underlying error.
        reason: String,
    },

    /// Message could not be encoded.
    #[error(transparent)]
    Encode(#[from] CodecError),
}
