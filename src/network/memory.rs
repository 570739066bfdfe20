//! In-Process Relay
//!
//! Stand-in for an external relay service: the host allocates a room and
//! gets back a short join code, peers join with that code. Both sides get a
//! [`Transport`] whose traffic is shuttled through shared in-memory queues.
//!
//! Single-threaded by construction (`Rc<RefCell<_>>`): host and peers are
//! driven from the same loop.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

use super::transport::{ConnectionId, SendError, Transport, TransportError, TransportEvent};

/// Join code length in characters.
pub const JOIN_CODE_LEN: usize = 6;

/// Shared relay. Cloning yields another handle to the same relay.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    inner: Rc<RefCell<RelayInner>>,
}

#[derive(Debug, Default)]
struct RelayInner {
    rooms: BTreeMap<String, Allocation>,
    links: BTreeMap<ConnectionId, Link>,
    next_id: u64,
}

#[derive(Debug)]
struct Allocation {
    max_connections: usize,
    pending: VecDeque<ConnectionId>,
    closed: bool,
}

#[derive(Debug)]
struct Link {
    code: String,
    accepted: bool,
    host_open: bool,
    peer_open: bool,
    severed: bool,
    fail_sends: bool,
    to_host: VecDeque<TransportEvent>,
    to_peer: VecDeque<TransportEvent>,
}

impl Link {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            accepted: false,
            host_open: false,
            peer_open: true,
            severed: false,
            fail_sends: false,
            to_host: VecDeque::new(),
            to_peer: VecDeque::new(),
        }
    }

    fn live(&self) -> bool {
        self.peer_open && !self.severed
    }
}

impl RelayInner {
    fn live_connections(&self, code: &str) -> usize {
        self.links
            .values()
            .filter(|link| link.code == code && link.live())
            .count()
    }

    /// Forget `conn` once neither end holds it open.
    fn release_if_closed(&mut self, conn: ConnectionId) {
        if self
            .links
            .get(&conn)
            .map_or(false, |link| !link.host_open && !link.peer_open)
        {
            self.links.remove(&conn);
            debug!("{} released", conn);
        }
    }
}

impl MemoryRelay {
    /// Empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a room for up to `max_connections` peers.
    ///
    /// Returns the join code and the host's end of the room.
    pub fn allocate(&self, max_connections: usize) -> Result<(String, MemoryHostTransport), RelayError> {
        if max_connections == 0 {
            return Err(RelayError::InvalidAllocation(max_connections));
        }
        let mut inner = self.inner.borrow_mut();
        let code = loop {
            let id = uuid::Uuid::new_v4();
            let code = hex::encode_upper(&id.as_bytes()[..JOIN_CODE_LEN / 2]);
            if !inner.rooms.contains_key(&code) {
                break code;
            }
        };
        inner.rooms.insert(
            code.clone(),
            Allocation {
                max_connections,
                pending: VecDeque::new(),
                closed: false,
            },
        );
        info!("Allocated room {} for {} connections", code, max_connections);
        Ok((
            code.clone(),
            MemoryHostTransport {
                relay: self.clone(),
                code,
                bound: false,
                listening: false,
            },
        ))
    }

    /// Join the room behind `code`. Codes are matched case-insensitively.
    pub fn join(&self, code: &str) -> Result<MemoryPeerTransport, RelayError> {
        let code = code.trim().to_ascii_uppercase();
        let mut inner = self.inner.borrow_mut();
        let max = match inner.rooms.get(&code) {
            Some(room) if !room.closed => room.max_connections,
            _ => return Err(RelayError::JoinCodeNotFound(code)),
        };
        if inner.live_connections(&code) >= max {
            return Err(RelayError::RoomFull { code, max });
        }

        inner.next_id += 1;
        let conn = ConnectionId(inner.next_id);
        inner.links.insert(conn, Link::new(&code));
        if let Some(room) = inner.rooms.get_mut(&code) {
            room.pending.push_back(conn);
        }
        debug!("{} queued to join room {}", conn, code);
        Ok(MemoryPeerTransport {
            relay: self.clone(),
            conn,
        })
    }

    /// Drop a connection as if the network failed. Both ends see
    /// `Disconnected` and further sends fail.
    pub fn sever(&self, conn: ConnectionId) {
        let mut inner = self.inner.borrow_mut();
        if let Some(link) = inner.links.get_mut(&conn) {
            if link.severed {
                return;
            }
            link.severed = true;
            if link.host_open {
                link.to_host.push_back(TransportEvent::Disconnected);
            }
            if link.peer_open {
                link.to_peer.push_back(TransportEvent::Disconnected);
            }
        }
    }

    /// Make every send over `conn` fail (either direction).
    pub fn set_fail_sends(&self, conn: ConnectionId, fail: bool) {
        if let Some(link) = self.inner.borrow_mut().links.get_mut(&conn) {
            link.fail_sends = fail;
        }
    }

    /// Connections the relay still tracks.
    pub fn link_count(&self) -> usize {
        self.inner.borrow().links.len()
    }

    /// Whether `code` names an open room.
    pub fn is_open(&self, code: &str) -> bool {
        self.inner
            .borrow()
            .rooms
            .get(code)
            .map_or(false, |room| !room.closed)
    }
}

// =============================================================================
// HOST END
// =============================================================================

/// Host side of an allocated room.
#[derive(Debug)]
pub struct MemoryHostTransport {
    relay: MemoryRelay,
    code: String,
    bound: bool,
    listening: bool,
}

impl MemoryHostTransport {
    /// Join code of this room.
    pub fn join_code(&self) -> &str {
        &self.code
    }

    /// Relay this room lives on.
    pub fn relay(&self) -> &MemoryRelay {
        &self.relay
    }
}

impl Transport for MemoryHostTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        if !self.relay.is_open(&self.code) {
            return Err(TransportError::Bind(format!("no allocation for join code {}", self.code)));
        }
        self.bound = true;
        Ok(())
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        if !self.bound {
            return Err(TransportError::Listen("transport is not bound".into()));
        }
        self.listening = true;
        Ok(())
    }

    fn connect(&mut self) -> Result<ConnectionId, TransportError> {
        Err(TransportError::Unsupported("connect"))
    }

    fn update(&mut self) {}

    fn accept(&mut self) -> Option<ConnectionId> {
        if !self.listening {
            return None;
        }
        let mut inner = self.relay.inner.borrow_mut();
        let inner = &mut *inner;
        let room = inner.rooms.get_mut(&self.code)?;
        while let Some(conn) = room.pending.pop_front() {
            let Some(link) = inner.links.get_mut(&conn) else {
                continue;
            };
            if !link.live() {
                continue;
            }
            link.accepted = true;
            link.host_open = true;
            link.to_peer.push_back(TransportEvent::Connected);
            return Some(conn);
        }
        None
    }

    fn is_created(&self, conn: ConnectionId) -> bool {
        self.relay
            .inner
            .borrow()
            .links
            .get(&conn)
            .map_or(false, |link| link.code == self.code && link.host_open)
    }

    fn pop_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        let mut inner = self.relay.inner.borrow_mut();
        let link = inner.links.get_mut(&conn).filter(|l| l.code == self.code)?;
        let event = link.to_host.pop_front()?;
        if event == TransportEvent::Disconnected {
            link.host_open = false;
            inner.release_if_closed(conn);
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        let mut inner = self.relay.inner.borrow_mut();
        let link = inner
            .links
            .get_mut(&conn)
            .filter(|l| l.code == self.code)
            .ok_or(SendError::UnknownConnection(conn))?;
        if !link.accepted {
            return Err(SendError::NotConnected(conn));
        }
        if !link.host_open || !link.live() {
            return Err(SendError::Closed(conn));
        }
        if link.fail_sends {
            return Err(SendError::Io {
                conn,
                reason: "relay rejected the packet".into(),
            });
        }
        link.to_peer.push_back(TransportEvent::Data(bytes.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        let mut inner = self.relay.inner.borrow_mut();
        if let Some(link) = inner.links.get_mut(&conn).filter(|l| l.code == self.code) {
            if link.host_open {
                link.host_open = false;
                if link.live() {
                    link.to_peer.push_back(TransportEvent::Disconnected);
                }
            }
        }
        inner.release_if_closed(conn);
    }
}

impl Drop for MemoryHostTransport {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.relay.inner.try_borrow_mut() {
            if let Some(room) = inner.rooms.get_mut(&self.code) {
                room.closed = true;
            }
        }
    }
}

// =============================================================================
// PEER END
// =============================================================================

/// Peer side of one relay connection.
#[derive(Debug)]
pub struct MemoryPeerTransport {
    relay: MemoryRelay,
    conn: ConnectionId,
}

impl MemoryPeerTransport {
    /// Handle of this peer's link (same id the host sees).
    pub fn connection(&self) -> ConnectionId {
        self.conn
    }
}

impl Transport for MemoryPeerTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("listen"))
    }

    fn connect(&mut self) -> Result<ConnectionId, TransportError> {
        if self.is_created(self.conn) {
            Ok(self.conn)
        } else {
            Err(TransportError::Connect(format!("{} is closed", self.conn)))
        }
    }

    fn update(&mut self) {}

    fn accept(&mut self) -> Option<ConnectionId> {
        None
    }

    fn is_created(&self, conn: ConnectionId) -> bool {
        conn == self.conn
            && self
                .relay
                .inner
                .borrow()
                .links
                .get(&conn)
                .map_or(false, |link| link.peer_open)
    }

    fn pop_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        if conn != self.conn {
            return None;
        }
        let mut inner = self.relay.inner.borrow_mut();
        let link = inner.links.get_mut(&conn)?;
        let event = link.to_peer.pop_front()?;
        if event == TransportEvent::Disconnected {
            link.peer_open = false;
            inner.release_if_closed(conn);
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        if conn != self.conn {
            return Err(SendError::UnknownConnection(conn));
        }
        let mut inner = self.relay.inner.borrow_mut();
        let link = inner
            .links
            .get_mut(&conn)
            .ok_or(SendError::UnknownConnection(conn))?;
        if !link.live() {
            return Err(SendError::Closed(conn));
        }
        if !link.accepted {
            return Err(SendError::NotConnected(conn));
        }
        if !link.host_open {
            return Err(SendError::Closed(conn));
        }
        if link.fail_sends {
            return Err(SendError::Io {
                conn,
                reason: "relay rejected the packet".into(),
            });
        }
        link.to_host.push_back(TransportEvent::Data(bytes.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if conn != self.conn {
            return;
        }
        let mut inner = self.relay.inner.borrow_mut();
        if let Some(link) = inner.links.get_mut(&conn) {
            if link.peer_open {
                let live = link.live();
                link.peer_open = false;
                if live && link.host_open {
                    link.to_host.push_back(TransportEvent::Disconnected);
                }
            }
        }
        inner.release_if_closed(conn);
    }
}

/// Allocation and join failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// No open room behind this code.
    #[error("join code '{0}' not found")]
    JoinCodeNotFound(String),

    /// Room has no free connection slots.
    #[error("room {code} is full ({max} connections)")]
    RoomFull {
        /// Join code.
        code: String,
        /// Allocated connection slots.
        max: usize,
    },

    /// A room needs at least one connection slot.
    #[error("cannot allocate a room for {0} connections")]
    InvalidAllocation(usize),
}
