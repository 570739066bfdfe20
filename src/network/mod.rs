//! Network Layer
//!
//! Typed room protocol, pluggable transports and the two dispatchers.
//! Only [`host::HostDispatcher`] mutates room state; all rules live in
//! [`session::RoomSession`] and `game/`.

pub mod protocol;
pub mod framing;
pub mod transport;
pub mod connection;
pub mod memory;
pub mod tcp;
pub mod session;
pub mod host;
pub mod peer;

pub use protocol::{
    CodecError, DiscardNotice, ExitReason, Message, PlayerCards, RosterEntry,
};
pub use transport::{ConnectionId, SendError, Transport, TransportError, TransportEvent};
pub use connection::ConnectionSession;
pub use memory::{MemoryHostTransport, MemoryPeerTransport, MemoryRelay, RelayError};
pub use tcp::{TcpHostTransport, TcpPeerTransport};
pub use session::{RequestRejected, RoomPhase, RoomSession, SessionError, TurnFlags};
pub use host::{HostDispatcher, HostError};
pub use peer::{PeerDispatcher, PeerView};
