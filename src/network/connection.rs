//! Connection Session
//!
//! Wraps a [`Transport`] with the active connection set and message-level
//! send/broadcast. One instance per side: the host tracks every peer, a peer
//! tracks its single link to the host.
//!
//! Per-connection events come out in arrival order. Nothing is promised
//! about ordering across connections.

use tracing::{debug, warn};

use super::protocol::Message;
use super::transport::{ConnectionId, SendError, Transport, TransportError, TransportEvent};

/// Active connections over one transport.
#[derive(Debug)]
pub struct ConnectionSession<T: Transport> {
    transport: T,
    connections: Vec<ConnectionId>,
}

impl<T: Transport> ConnectionSession<T> {
    /// Wrap a transport with no connections yet.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connections: Vec::new(),
        }
    }

    /// Claim the local endpoint.
    pub fn bind(&mut self) -> Result<(), TransportError> {
        self.transport.bind()
    }

    /// Start accepting connections.
    pub fn listen(&mut self) -> Result<(), TransportError> {
        self.transport.listen()
    }

    /// Open the link to the host and track it.
    pub fn connect(&mut self) -> Result<ConnectionId, TransportError> {
        let conn = self.transport.connect()?;
        self.connections.push(conn);
        Ok(conn)
    }

    /// Drive the transport and drop connections it no longer reports.
    pub fn service(&mut self) {
        self.transport.update();
        self.prune_stale();
    }

    /// Forget connections the transport reports as gone.
    pub fn prune_stale(&mut self) {
        let transport = &self.transport;
        self.connections.retain(|conn| {
            let alive = transport.is_created(*conn);
            if !alive {
                debug!("Pruned stale connection {}", conn);
            }
            alive
        });
    }

    /// Accept one pending connection.
    pub fn accept(&mut self) -> Option<ConnectionId> {
        let conn = self.transport.accept()?;
        self.connections.push(conn);
        Some(conn)
    }

    /// Accept every pending connection.
    pub fn accept_all(&mut self) -> Vec<ConnectionId> {
        std::iter::from_fn(|| self.accept()).collect()
    }

    /// Tracked connections, in accept order.
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// Whether `conn` is tracked.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.contains(&conn)
    }

    /// Pop the next event for `conn`.
    pub fn next_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        self.transport.pop_event(conn)
    }

    /// Lazily drain the event queue of `conn`.
    pub fn poll(&mut self, conn: ConnectionId) -> Poll<'_, T> {
        Poll {
            transport: &mut self.transport,
            conn,
        }
    }

    /// Encode and send one message.
    pub fn send(&mut self, conn: ConnectionId, message: &Message) -> Result<(), SendError> {
        let bytes = message.encode()?;
        self.transport.send(conn, &bytes)
    }

    /// Send to every tracked connection. Failures are logged and skipped.
    ///
    /// Returns how many sends succeeded.
    pub fn broadcast(&mut self, message: &Message) -> usize {
        let bytes = match message.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode {} broadcast: {}", message.kind(), e);
                return 0;
            }
        };
        let mut delivered = 0;
        for &conn in &self.connections {
            match self.transport.send(conn, &bytes) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Broadcast of {} to {} failed: {}", message.kind(), conn, e),
            }
        }
        delivered
    }

    /// Close `conn` and stop tracking it.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        self.transport.disconnect(conn);
        self.connections.retain(|c| *c != conn);
    }

    /// Close every connection.
    pub fn disconnect_all(&mut self) {
        for conn in std::mem::take(&mut self.connections) {
            self.transport.disconnect(conn);
        }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

/// Iterator over the queued events of one connection.
pub struct Poll<'a, T: Transport> {
    transport: &'a mut T,
    conn: ConnectionId,
}

impl<T: Transport> Iterator for Poll<'_, T> {
    type Item = TransportEvent;

    fn next(&mut self) -> Option<TransportEvent> {
        self.transport.pop_event(self.conn)
    }
}
