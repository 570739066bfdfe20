//! Host Dispatcher
//!
//! The authoritative side of a room. Each tick it services the transport,
//! accepts new connections and drains every connection's event queue,
//! validating peer requests against the [`RoomSession`] before applying
//! them and broadcasting the result.
//!
//! Rejected requests (out of turn, wrong identity, card not held...) are
//! logged and dropped. They never reach the caller and never end the room.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::card::Card;
use crate::game::hand::Hand;
use crate::game::settings::{RoomSettings, SettingsError};
use crate::network::connection::ConnectionSession;
use crate::network::protocol::{DiscardNotice, ExitReason, Message, PlayerCards};
use crate::network::session::{
    RequestRejected, RoomPhase, RoomSession, SessionError, TurnHandoff, HOST_POSITION,
};
use crate::network::transport::{ConnectionId, Transport, TransportError, TransportEvent};

/// Status sent to a peer whose draw found nothing.
pub const EMPTY_PILE_STATUS: &str = "The draw pile is empty";

/// Host room driver.
#[derive(Debug)]
pub struct HostDispatcher<T: Transport> {
    connections: ConnectionSession<T>,
    room: RoomSession,
    /// Username registered on each connection.
    players: BTreeMap<ConnectionId, String>,
    /// Connection serving each peer seat.
    seats: BTreeMap<usize, ConnectionId>,
    status: String,
    open: bool,
}

impl<T: Transport> HostDispatcher<T> {
    /// Bind, listen and seat `host_name` at position 0.
    pub fn open(
        transport: T,
        settings: RoomSettings,
        host_name: &str,
        join_code: &str,
    ) -> Result<Self, HostError> {
        let room = RoomSession::new(settings, host_name, join_code)?;
        let mut connections = ConnectionSession::new(transport);
        connections.bind()?;
        connections.listen()?;
        info!("Room '{}' open with join code {}", room.room_name(), join_code);
        Ok(Self {
            connections,
            room,
            players: BTreeMap::new(),
            seats: BTreeMap::new(),
            status: String::new(),
            open: true,
        })
    }

    /// One scheduler step: service, accept, then drain each connection.
    pub fn tick(&mut self) {
        if !self.open {
            return;
        }
        self.connections.service();
        for conn in self.connections.accept_all() {
            info!("Accepted {}", conn);
        }

        let active = self.connections.connections().to_vec();
        for conn in active {
            while self.connections.contains(conn) {
                let Some(event) = self.connections.next_event(conn) else {
                    break;
                };
                self.handle_event(conn, event);
                if !self.open {
                    return;
                }
            }
        }
    }

    fn handle_event(&mut self, conn: ConnectionId, event: TransportEvent) {
        match event {
            TransportEvent::Data(bytes) => match Message::decode(&bytes) {
                Ok(message) => self.handle_message(conn, message),
                Err(e) => warn!("Dropping undecodable message from {}: {}", conn, e),
            },
            TransportEvent::Connected => debug!("{} connected", conn),
            TransportEvent::Disconnected => self.handle_disconnect(conn),
        }
    }

    #[instrument(skip(self, message), fields(kind = message.kind()))]
    fn handle_message(&mut self, conn: ConnectionId, message: Message) {
        match message {
            Message::PlayerJoin(username) => self.handle_join(conn, username),
            Message::Status(text) => self.handle_status(conn, text),
            Message::DrawRequest(username) => self.handle_draw_request(conn, &username),
            Message::DiscardCard(notice) => self.handle_discard(conn, notice),
            Message::MadeMove(username) => self.handle_made_move(conn, &username),
            other => debug!("Unhandled message type {} from {}", other.kind(), conn),
        }
    }

    // =========================================================================
    // PEER REQUESTS
    // =========================================================================

    fn handle_join(&mut self, conn: ConnectionId, username: String) {
        if let Some(existing) = self.players.get(&conn) {
            warn!("{} already joined as {}", conn, existing);
            return;
        }
        match self.room.register(&username) {
            Ok(position) => {
                self.players.insert(conn, username.clone());
                self.seats.insert(position, conn);
                self.send_to(conn, &Message::ClientId(position));
                self.connections.broadcast(&Message::RoomInfo(self.room.room_name()));
                self.broadcast_status(format!("{} joined the room", username));
                self.connections.broadcast(&Message::PlayerManagerArrange(
                    self.room.settings().max_players,
                ));
                self.connections.broadcast(&Message::PlayerManagerSync(self.room.roster()));
            }
            Err(reason) => {
                warn!("Refused join of '{}' on {}: {}", username, conn, reason);
                self.send_to(conn, &Message::Status(format!("Join refused: {}", reason)));
                self.connections.disconnect(conn);
            }
        }
    }

    fn handle_status(&mut self, conn: ConnectionId, text: String) {
        if !self.players.contains_key(&conn) {
            return self.reject(conn, RequestRejected::NotJoined);
        }
        // peers read this exact text as the empty-pile signal
        if text == EMPTY_PILE_STATUS {
            warn!("Dropping empty-pile status from {}", conn);
            return;
        }
        self.broadcast_status(text);
    }

    fn handle_draw_request(&mut self, conn: ConnectionId, claimed: &str) {
        let username = match self.identify(conn, Some(claimed)) {
            Ok(name) => name,
            Err(reason) => return self.reject(conn, reason),
        };
        match self.room.draw(&username) {
            Ok(card) => {
                let player_id = self.room.turns().position(&username).unwrap_or_default();
                self.send_to(
                    conn,
                    &Message::DrawCard(PlayerCards {
                        player_id,
                        username,
                        cards: vec![card],
                    }),
                );
            }
            Err(RequestRejected::EmptyPile) => {
                self.send_to(conn, &Message::Status(EMPTY_PILE_STATUS.to_string()));
            }
            Err(reason) => self.reject(conn, reason),
        }
    }

    fn handle_discard(&mut self, conn: ConnectionId, notice: DiscardNotice) {
        let username = match self.identify(conn, notice.username.as_deref()) {
            Ok(name) => name,
            Err(reason) => return self.reject(conn, reason),
        };
        match self.room.discard(&username, notice.card) {
            Ok(()) => self.announce_discard(&username, notice.card),
            Err(reason) => self.reject(conn, reason),
        }
    }

    fn handle_made_move(&mut self, conn: ConnectionId, claimed: &str) {
        let username = match self.identify(conn, Some(claimed)) {
            Ok(name) => name,
            Err(reason) => return self.reject(conn, reason),
        };
        match self.room.end_turn(&username) {
            Ok(handoff) => self.announce_handoff(&username, &handoff),
            Err(reason) => self.reject(conn, reason),
        }
    }

    fn handle_disconnect(&mut self, conn: ConnectionId) {
        self.connections.disconnect(conn);
        let Some(username) = self.players.remove(&conn) else {
            debug!("{} disconnected before joining", conn);
            return;
        };
        self.seats.retain(|_, c| *c != conn);
        info!("{} left the room", username);
        self.connections.broadcast(&Message::Exit(ExitReason::PeerLeft));
        self.close();
    }

    /// Registered name of `conn`, checked against the name it claims.
    fn identify(&self, conn: ConnectionId, claimed: Option<&str>) -> Result<String, RequestRejected> {
        let registered = self.players.get(&conn).ok_or(RequestRejected::NotJoined)?;
        match claimed {
            Some(claimed) if claimed != registered => Err(RequestRejected::IdentityMismatch {
                claimed: claimed.to_string(),
                registered: registered.clone(),
            }),
            _ => Ok(registered.clone()),
        }
    }

    fn reject(&self, conn: ConnectionId, reason: RequestRejected) {
        warn!("Rejected request from {}: {}", conn, reason);
    }

    // =========================================================================
    // HOST ACTIONS
    // =========================================================================

    /// Shuffle, deal and announce the game.
    #[instrument(skip(self))]
    pub fn start_game(&mut self) -> Result<(), SessionError> {
        let outcome = self.room.start_game()?;
        let deck_count = self.room.settings().deck_count;

        self.broadcast_status("Host started the Game".to_string());
        self.connections
            .broadcast(&Message::PlayerManagerCurrentStart(HOST_POSITION));
        self.connections.broadcast(&Message::StartGame(deck_count));

        for dealt in outcome.dealt {
            if dealt.position == HOST_POSITION {
                continue;
            }
            match self.seats.get(&dealt.position).copied() {
                Some(conn) => self.send_to(
                    conn,
                    &Message::DealCards(PlayerCards {
                        player_id: dealt.position,
                        username: dealt.username,
                        cards: dealt.cards,
                    }),
                ),
                None => warn!("No connection for seat {}", dealt.position),
            }
        }

        self.connections.broadcast(&Message::UpdateDeckCount(deck_count));
        Ok(())
    }

    /// Draw for the host's own seat.
    pub fn draw(&mut self) -> Result<Card, RequestRejected> {
        let host = self.room.host_name().to_string();
        let result = self.room.draw(&host);
        if result == Err(RequestRejected::EmptyPile) {
            self.status = EMPTY_PILE_STATUS.to_string();
        }
        result
    }

    /// Discard from the host's own hand.
    pub fn discard(&mut self, card: Card) -> Result<(), RequestRejected> {
        let host = self.room.host_name().to_string();
        self.room.discard(&host, card)?;
        self.announce_discard(&host, card);
        Ok(())
    }

    /// Pass the host's turn on.
    pub fn end_turn(&mut self) -> Result<TurnHandoff, RequestRejected> {
        let host = self.room.host_name().to_string();
        let handoff = self.room.end_turn(&host)?;
        self.announce_handoff(&host, &handoff);
        Ok(handoff)
    }

    /// Set and broadcast the status line.
    pub fn send_status(&mut self, text: impl Into<String>) {
        self.broadcast_status(text.into());
    }

    /// Close the room: tell every peer the host left and disconnect them.
    pub fn shutdown(&mut self) {
        if !self.open {
            return;
        }
        info!("Host closing room {}", self.room.join_code());
        self.connections.broadcast(&Message::Exit(ExitReason::HostLeft));
        self.close();
    }

    fn close(&mut self) {
        self.room.end();
        self.connections.disconnect_all();
        self.players.clear();
        self.seats.clear();
        self.open = false;
    }

    // =========================================================================
    // BROADCASTS
    // =========================================================================

    fn broadcast_status(&mut self, text: String) {
        info!("Status: {}", text);
        self.connections.broadcast(&Message::Status(text.clone()));
        self.status = text;
    }

    fn announce_discard(&mut self, username: &str, card: Card) {
        self.broadcast_status(format!("{} discarded {}", username, card));
        self.connections
            .broadcast(&Message::DiscardCard(DiscardNotice::new(card, username)));
    }

    fn announce_handoff(&mut self, username: &str, handoff: &TurnHandoff) {
        self.broadcast_status(format!("{} made move", username));
        self.connections
            .broadcast(&Message::PlayerManagerCurrentEnd(handoff.ended));
        self.connections
            .broadcast(&Message::PlayerManagerCurrentStart(handoff.next));
        if handoff.next == HOST_POSITION {
            debug!("Turn returns to the host");
        } else {
            self.connections
                .broadcast(&Message::ChangeTurn(handoff.next_player.clone()));
        }
    }

    fn send_to(&mut self, conn: ConnectionId, message: &Message) {
        if let Err(e) = self.connections.send(conn, message) {
            warn!("Failed to send {} to {}: {}", message.kind(), conn, e);
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Authoritative room state.
    pub fn room(&self) -> &RoomSession {
        &self.room
    }

    /// Last status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the room is still running.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the host holds the turn in a running game.
    pub fn is_my_turn(&self) -> bool {
        self.room.phase() == RoomPhase::Playing && self.room.turns().is_turn(self.room.host_name())
    }

    /// The host's own hand.
    pub fn hand(&self) -> Option<&Hand> {
        self.room.hand(HOST_POSITION)
    }

    /// Connection serving `username`, if that player is a connected peer.
    pub fn connection_of(&self, username: &str) -> Option<ConnectionId> {
        let position = self.room.turns().position(username)?;
        self.seats.get(&position).copied()
    }

    /// Tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.connections().len()
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        self.connections.transport()
    }
}

/// Room setup failures.
#[derive(Debug, Error)]
pub enum HostError {
    /// Settings or host name invalid.
    #[error("invalid room settings: {0}")]
    Settings(#[from] SettingsError),

    /// Transport could not bind or listen.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::memory::{MemoryHostTransport, MemoryPeerTransport, MemoryRelay};
    use crate::network::protocol::RosterEntry;

    /// Peer that speaks raw messages so tests can see exactly what arrives.
    struct RawPeer {
        session: ConnectionSession<MemoryPeerTransport>,
        link: ConnectionId,
    }

    impl RawPeer {
        fn join(relay: &MemoryRelay, code: &str) -> Self {
            let mut session = ConnectionSession::new(relay.join(code).unwrap());
            let link = session.connect().unwrap();
            Self { session, link }
        }

        fn send(&mut self, message: Message) {
            self.session.send(self.link, &message).unwrap();
        }

        fn events(&mut self) -> Vec<TransportEvent> {
            self.session.poll(self.link).collect()
        }

        fn messages(&mut self) -> Vec<Message> {
            self.events()
                .into_iter()
                .filter_map(|ev| match ev {
                    TransportEvent::Data(bytes) => Some(Message::decode(&bytes).unwrap()),
                    _ => None,
                })
                .collect()
        }
    }

    type Host = HostDispatcher<MemoryHostTransport>;

    fn open_room(settings: RoomSettings) -> (MemoryRelay, String, Host) {
        let relay = MemoryRelay::new();
        let (code, transport) = relay.allocate(settings.max_connections()).unwrap();
        let host = HostDispatcher::open(transport, settings, "host", &code).unwrap();
        (relay, code, host)
    }

    fn seat(relay: &MemoryRelay, code: &str, host: &mut Host, name: &str) -> RawPeer {
        let mut peer = RawPeer::join(relay, code);
        host.tick();
        peer.send(Message::PlayerJoin(name.to_string()));
        host.tick();
        peer
    }

    fn settings() -> RoomSettings {
        RoomSettings {
            seed: Some(11),
            clockwise: false,
            ..Default::default()
        }
    }

    /// Host plus alice and bob, game started, all queues drained.
    fn started() -> (MemoryRelay, Host, RawPeer, RawPeer) {
        let (relay, code, mut host) = open_room(settings());
        let mut alice = seat(&relay, &code, &mut host, "alice");
        let mut bob = seat(&relay, &code, &mut host, "bob");
        host.start_game().unwrap();
        alice.events();
        bob.events();
        (relay, host, alice, bob)
    }

    fn card_not_held(hand: &Hand) -> Card {
        Card::standard_deck()
            .into_iter()
            .find(|c| !hand.contains(*c))
            .unwrap()
    }

    #[test]
    fn test_join_sequence() {
        let (relay, code, mut host) = open_room(settings());
        let mut alice = seat(&relay, &code, &mut host, "alice");
        assert_eq!(alice.events()[0], TransportEvent::Connected);

        let mut bob = seat(&relay, &code, &mut host, "bob");
        assert_eq!(
            bob.messages(),
            vec![
                Message::ClientId(2),
                Message::RoomInfo("host's Room".into()),
                Message::Status("bob joined the room".into()),
                Message::PlayerManagerArrange(4),
                Message::PlayerManagerSync(vec![
                    RosterEntry { username: "host".into(), client_id: 0 },
                    RosterEntry { username: "alice".into(), client_id: 1 },
                    RosterEntry { username: "bob".into(), client_id: 2 },
                ]),
            ]
        );

        // existing peers see the broadcasts but not the clientID
        let seen = alice.messages();
        assert_eq!(seen.len(), 4);
        assert!(!seen.iter().any(|m| matches!(m, Message::ClientId(_))));
        assert_eq!(host.room().turns().count(), 3);
        assert_eq!(host.connection_of("bob"), Some(bob.link));
        assert_eq!(host.status(), "bob joined the room");
    }

    #[test]
    fn test_duplicate_name_refused() {
        let (relay, code, mut host) = open_room(settings());
        let _alice = seat(&relay, &code, &mut host, "alice");
        let mut impostor = seat(&relay, &code, &mut host, "alice");

        let events = impostor.events();
        assert_eq!(events.first(), Some(&TransportEvent::Connected));
        assert_eq!(events.last(), Some(&TransportEvent::Disconnected));
        assert!(matches!(
            Message::decode(match &events[1] {
                TransportEvent::Data(bytes) => bytes,
                other => panic!("unexpected {:?}", other),
            }),
            Ok(Message::Status(text)) if text.starts_with("Join refused")
        ));
        assert_eq!(host.room().turns().count(), 2);
        assert!(host.is_open());
    }

    #[test]
    fn test_join_refused_after_start() {
        let (relay, host, _alice, _bob) = started();
        let mut host = host;
        let code = host.room().join_code().to_string();
        let mut late = seat(&relay, &code, &mut host, "carol");
        assert_eq!(late.events().last(), Some(&TransportEvent::Disconnected));
        assert_eq!(host.room().turns().count(), 3);
    }

    #[test]
    fn test_start_needs_two_players() {
        let (_relay, _code, mut host) = open_room(settings());
        assert_eq!(
            host.start_game(),
            Err(SessionError::NotEnoughPlayers { have: 1, need: 2 })
        );
    }

    #[test]
    fn test_start_sequence() {
        let (relay, code, mut host) = open_room(settings());
        let mut alice = seat(&relay, &code, &mut host, "alice");
        let mut bob = seat(&relay, &code, &mut host, "bob");
        alice.events();
        bob.events();

        host.start_game().unwrap();

        let seen = alice.messages();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0], Message::Status("Host started the Game".into()));
        assert_eq!(seen[1], Message::PlayerManagerCurrentStart(0));
        assert_eq!(seen[2], Message::StartGame(1));
        match &seen[3] {
            Message::DealCards(dealt) => {
                assert_eq!(dealt.player_id, 1);
                assert_eq!(dealt.username, "alice");
                assert_eq!(dealt.cards.len(), 5);
                assert_eq!(host.room().hand(1).unwrap().cards(), dealt.cards.as_slice());
            }
            other => panic!("expected deal-cards, got {:?}", other),
        }
        assert_eq!(seen[4], Message::UpdateDeckCount(1));

        assert_eq!(host.hand().unwrap().len(), 5);
        assert_eq!(host.room().deck().len(), 37);
        assert!(host.is_my_turn());
    }

    #[test]
    fn test_out_of_turn_draw_ignored() {
        let (_relay, mut host, mut alice, mut bob) = started();
        bob.send(Message::DrawRequest("bob".into()));
        host.tick();
        assert!(bob.messages().is_empty());
        assert!(alice.messages().is_empty());
        assert_eq!(host.room().deck().len(), 37);
    }

    #[test]
    fn test_identity_mismatch_ignored() {
        let (_relay, mut host, mut alice, _bob) = started();
        alice.send(Message::DrawRequest("host".into()));
        alice.send(Message::MadeMove("host".into()));
        host.tick();
        assert!(alice.messages().is_empty());
        assert_eq!(host.room().deck().len(), 37);
        assert!(host.is_my_turn());
    }

    #[test]
    fn test_host_turn_then_peer_turn() {
        let (_relay, mut host, mut alice, mut bob) = started();

        let drawn = host.draw().unwrap();
        host.discard(drawn).unwrap();
        let handoff = host.end_turn().unwrap();
        assert_eq!(handoff.next_player, "alice");

        assert_eq!(
            bob.messages(),
            vec![
                Message::Status(format!("host discarded {}", drawn)),
                Message::DiscardCard(DiscardNotice::new(drawn, "host")),
                Message::Status("host made move".into()),
                Message::PlayerManagerCurrentEnd(0),
                Message::PlayerManagerCurrentStart(1),
                Message::ChangeTurn("alice".into()),
            ]
        );
        alice.events();

        alice.send(Message::DrawRequest("alice".into()));
        host.tick();
        let card = match alice.messages().as_slice() {
            [Message::DrawCard(drawn)] => {
                assert_eq!(drawn.player_id, 1);
                assert_eq!(drawn.cards.len(), 1);
                drawn.cards[0]
            }
            other => panic!("expected one draw-card, got {:?}", other),
        };
        // draw reply is unicast
        assert!(bob.messages().is_empty());

        alice.send(Message::DiscardCard(DiscardNotice::new(card, "alice")));
        alice.send(Message::MadeMove("alice".into()));
        host.tick();

        let seen = bob.messages();
        assert!(seen.contains(&Message::DiscardCard(DiscardNotice::new(card, "alice"))));
        assert_eq!(seen.last(), Some(&Message::ChangeTurn("bob".into())));
        assert!(host.room().turns().is_turn("bob"));
        assert_eq!(host.room().deck().discard_pile(), &[drawn, card]);
        assert_eq!(host.room().cards_in_play(), 52);
    }

    #[test]
    fn test_turn_returns_to_host_without_change_turn() {
        let settings = RoomSettings { clockwise: true, ..settings() };
        let (relay, code, mut host) = open_room(settings);
        let mut alice = seat(&relay, &code, &mut host, "alice");
        host.start_game().unwrap();
        host.end_turn().unwrap();
        alice.events();

        alice.send(Message::MadeMove("alice".into()));
        host.tick();
        let seen = alice.messages();
        assert_eq!(seen.last(), Some(&Message::PlayerManagerCurrentStart(0)));
        assert!(!seen.iter().any(|m| matches!(m, Message::ChangeTurn(_))));
        assert!(host.is_my_turn());
    }

    #[test]
    fn test_discard_not_in_hand_rejected() {
        let (_relay, mut host, mut alice, mut bob) = started();
        host.end_turn().unwrap();
        alice.events();
        bob.events();

        let missing = card_not_held(host.room().hand(1).unwrap());
        alice.send(Message::DiscardCard(DiscardNotice::new(missing, "alice")));
        host.tick();
        assert!(bob.messages().is_empty());
        assert!(host.room().deck().discard_pile().is_empty());
        assert!(!host.room().turn_flags().discarded);
    }

    #[test]
    fn test_incomplete_turn_cannot_pass() {
        let (_relay, mut host, mut alice, _bob) = started();
        host.draw().unwrap();
        assert!(matches!(host.end_turn(), Err(RequestRejected::TurnIncomplete(_))));
        assert!(host.is_my_turn());
        assert!(alice.messages().is_empty());
    }

    #[test]
    fn test_empty_pile_status() {
        let settings = RoomSettings { cards_per_hand: 8, ..settings() };
        let (relay, code, mut host) = open_room(settings);
        let mut alice = seat(&relay, &code, &mut host, "alice");
        host.start_game().unwrap();

        // 52 - 16 dealt
        for _ in 0..36 {
            let card = host.draw().unwrap();
            host.discard(card).unwrap();
            host.end_turn().unwrap();
            alice.send(Message::MadeMove("alice".into()));
            host.tick();
        }
        assert_eq!(host.draw(), Err(RequestRejected::EmptyPile));
        assert_eq!(host.status(), EMPTY_PILE_STATUS);
        host.end_turn().unwrap();
        alice.events();

        alice.send(Message::DrawRequest("alice".into()));
        host.tick();
        assert_eq!(alice.messages(), vec![Message::Status(EMPTY_PILE_STATUS.into())]);
        assert!(!host.room().turn_flags().drew);
        assert_eq!(host.room().cards_in_play(), 52);
    }

    #[test]
    fn test_peer_status_rebroadcast() {
        let (_relay, mut host, mut alice, mut bob) = started();
        alice.send(Message::Status("good luck".into()));
        host.tick();
        assert_eq!(bob.messages(), vec![Message::Status("good luck".into())]);
        assert_eq!(alice.messages(), vec![Message::Status("good luck".into())]);
        assert_eq!(host.status(), "good luck");
    }

    #[test]
    fn test_peer_cannot_fake_empty_pile() {
        let (_relay, mut host, mut alice, mut bob) = started();
        let before = host.status().to_string();
        alice.send(Message::Status(EMPTY_PILE_STATUS.into()));
        host.tick();
        assert!(bob.messages().is_empty());
        assert!(alice.messages().is_empty());
        assert_eq!(host.status(), before);
        assert!(host.is_open());
    }

    #[test]
    fn test_garbage_dropped() {
        let (_relay, mut host, mut alice, _bob) = started();
        let link = alice.link;
        alice.session.transport_mut().send(link, b"not json").unwrap();
        alice.session.transport_mut().send(link, b"").unwrap();
        host.tick();
        assert!(host.is_open());
        assert_eq!(host.room().phase(), RoomPhase::Playing);
    }

    #[test]
    fn test_peer_disconnect_ends_room() {
        let (_relay, mut host, mut alice, mut bob) = started();
        alice.session.disconnect(alice.link);
        host.tick();

        assert_eq!(
            bob.events(),
            vec![
                TransportEvent::Data(Message::Exit(ExitReason::PeerLeft).encode().unwrap()),
                TransportEvent::Disconnected,
            ]
        );
        assert!(!host.is_open());
        assert_eq!(host.room().phase(), RoomPhase::Ended);
        assert_eq!(host.connection_count(), 0);
    }

    #[test]
    fn test_severed_link_ends_room() {
        let (relay, mut host, _alice, mut bob) = started();
        let conn = host.connection_of("alice").unwrap();
        relay.sever(conn);
        host.tick();
        assert!(bob
            .messages()
            .contains(&Message::Exit(ExitReason::PeerLeft)));
        assert!(!host.is_open());
    }

    #[test]
    fn test_shutdown() {
        let (_relay, mut host, mut alice, _bob) = started();
        host.shutdown();
        assert_eq!(
            alice.events(),
            vec![
                TransportEvent::Data(Message::Exit(ExitReason::HostLeft).encode().unwrap()),
                TransportEvent::Disconnected,
            ]
        );
        assert!(!host.is_open());
        // ticking a closed room is a no-op
        host.tick();
    }

    #[test]
    fn test_failed_send_is_not_fatal() {
        let (relay, mut host, mut alice, mut bob) = started();
        relay.set_fail_sends(host.connection_of("bob").unwrap(), true);
        host.send_status("anyone there?");
        assert_eq!(alice.messages(), vec![Message::Status("anyone there?".into())]);
        assert!(bob.messages().is_empty());
        assert!(host.is_open());
    }
}
