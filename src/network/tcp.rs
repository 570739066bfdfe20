//! TCP Transport
//!
//! Non-blocking `std::net` sockets with length-prefixed frames (see
//! [`super::framing`]). The host listens, each peer opens one stream.
//! All socket work happens inside [`Transport::update`], so the tick loop
//! never waits on the network.

use std::collections::{BTreeMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info, warn};

use super::framing::{encode_frame, FrameDecoder};
use super::transport::{ConnectionId, SendError, Transport, TransportError, TransportEvent};

/// Outbound bytes allowed to queue per connection before sends fail.
const MAX_PENDING_WRITE: usize = 1024 * 1024;

/// Read chunk size.
const READ_CHUNK: usize = 4096;

/// One framed stream plus its queues.
#[derive(Debug)]
struct TcpLink {
    stream: TcpStream,
    decoder: FrameDecoder,
    outbound: Vec<u8>,
    events: VecDeque<TransportEvent>,
    closed: bool,
}

impl TcpLink {
    fn new(stream: TcpStream) -> std::io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            outbound: Vec::new(),
            events: VecDeque::new(),
            closed: false,
        })
    }

    /// Read whatever is available and flush pending writes.
    fn pump(&mut self, conn: ConnectionId) {
        if self.closed {
            return;
        }
        self.read_available(conn);
        if !self.closed {
            if let Err(e) = self.flush() {
                debug!("Write to {} failed: {}", conn, e);
                self.close();
            }
        }
    }

    fn read_available(&mut self, conn: ConnectionId) {
        let mut chunk = [0u8; READ_CHUNK];
        let mut remote_gone = false;
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    debug!("{} closed by remote", conn);
                    remote_gone = true;
                    break;
                }
                Ok(n) => self.decoder.extend(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Read from {} failed: {}", conn, e);
                    remote_gone = true;
                    break;
                }
            }
        }
        // frames that arrived ahead of the close still count
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => self.events.push_back(TransportEvent::Data(frame)),
                Ok(None) => break,
                Err(e) => {
                    warn!("Dropping {}: {}", conn, e);
                    remote_gone = true;
                    break;
                }
            }
        }
        if remote_gone {
            self.close();
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn queue(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::Closed(conn));
        }
        let frame = encode_frame(bytes).map_err(|e| SendError::Io {
            conn,
            reason: e.to_string(),
        })?;
        if self.outbound.len() + frame.len() > MAX_PENDING_WRITE {
            return Err(SendError::WouldBlock(conn));
        }
        self.outbound.extend_from_slice(&frame);
        self.flush().map_err(|e| {
            self.close();
            SendError::Io {
                conn,
                reason: e.to_string(),
            }
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.shutdown(Shutdown::Both);
            self.events.push_back(TransportEvent::Disconnected);
        }
    }
}

// =============================================================================
// HOST
// =============================================================================

/// Listening side.
#[derive(Debug)]
pub struct TcpHostTransport {
    addr: SocketAddr,
    listener: Option<TcpListener>,
    listening: bool,
    links: BTreeMap<ConnectionId, TcpLink>,
    next_id: u64,
}

impl TcpHostTransport {
    /// Host that will bind `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            listener: None,
            listening: false,
            links: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl Transport for TcpHostTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        let listener =
            TcpListener::bind(self.addr).map_err(|e| TransportError::Bind(e.to_string()))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| TransportError::Bind(e.to_string()))?;
        info!("Bound {}", self.addr);
        self.listener = Some(listener);
        Ok(())
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        if self.listener.is_none() {
            return Err(TransportError::Listen("transport is not bound".into()));
        }
        self.listening = true;
        Ok(())
    }

    fn connect(&mut self) -> Result<ConnectionId, TransportError> {
        Err(TransportError::Unsupported("connect"))
    }

    fn update(&mut self) {
        for (conn, link) in self.links.iter_mut() {
            link.pump(*conn);
        }
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        if !self.listening {
            return None;
        }
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, remote)) => match TcpLink::new(stream) {
                Ok(link) => {
                    self.next_id += 1;
                    let conn = ConnectionId(self.next_id);
                    info!("New connection from {} as {}", remote, conn);
                    self.links.insert(conn, link);
                    Some(conn)
                }
                Err(e) => {
                    warn!("Failed to configure stream from {}: {}", remote, e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("Accept error: {}", e);
                None
            }
        }
    }

    fn is_created(&self, conn: ConnectionId) -> bool {
        self.links.contains_key(&conn)
    }

    fn pop_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        let link = self.links.get_mut(&conn)?;
        let event = link.events.pop_front()?;
        if event == TransportEvent::Disconnected {
            self.links.remove(&conn);
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        self.links
            .get_mut(&conn)
            .ok_or(SendError::UnknownConnection(conn))?
            .queue(conn, bytes)
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if let Some(mut link) = self.links.remove(&conn) {
            let _ = link.flush();
            let _ = link.stream.shutdown(Shutdown::Both);
        }
    }
}

// =============================================================================
// PEER
// =============================================================================

/// Connecting side.
#[derive(Debug)]
pub struct TcpPeerTransport {
    addr: SocketAddr,
    link: Option<TcpLink>,
}

/// The single connection a peer holds.
const HOST_LINK: ConnectionId = ConnectionId(0);

impl TcpPeerTransport {
    /// Peer that will connect to `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, link: None }
    }
}

impl Transport for TcpPeerTransport {
    fn bind(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn listen(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("listen"))
    }

    fn connect(&mut self) -> Result<ConnectionId, TransportError> {
        let stream =
            TcpStream::connect(self.addr).map_err(|e| TransportError::Connect(e.to_string()))?;
        let mut link = TcpLink::new(stream).map_err(|e| TransportError::Connect(e.to_string()))?;
        link.events.push_back(TransportEvent::Connected);
        info!("Connected to {}", self.addr);
        self.link = Some(link);
        Ok(HOST_LINK)
    }

    fn update(&mut self) {
        if let Some(link) = self.link.as_mut() {
            link.pump(HOST_LINK);
        }
    }

    fn accept(&mut self) -> Option<ConnectionId> {
        None
    }

    fn is_created(&self, conn: ConnectionId) -> bool {
        conn == HOST_LINK && self.link.is_some()
    }

    fn pop_event(&mut self, conn: ConnectionId) -> Option<TransportEvent> {
        if conn != HOST_LINK {
            return None;
        }
        let link = self.link.as_mut()?;
        let event = link.events.pop_front()?;
        if event == TransportEvent::Disconnected {
            self.link = None;
        }
        Some(event)
    }

    fn send(&mut self, conn: ConnectionId, bytes: &[u8]) -> Result<(), SendError> {
        if conn != HOST_LINK {
            return Err(SendError::UnknownConnection(conn));
        }
        self.link
            .as_mut()
            .ok_or(SendError::Closed(conn))?
            .queue(conn, bytes)
    }

    fn disconnect(&mut self, conn: ConnectionId) {
        if conn != HOST_LINK {
            return;
        }
        if let Some(mut link) = self.link.take() {
            let _ = link.flush();
            let _ = link.stream.shutdown(Shutdown::Both);
        }
    }
}
