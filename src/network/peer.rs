//! Peer Dispatcher
//!
//! The non-authoritative side. A [`PeerView`] mirrors what the host has
//! broadcast (roster, active seat, own hand, discards, status line) and
//! [`PeerDispatcher`] forwards local user actions to the host.
//!
//! Local gating (`is_turn`, draw/discard flags) only decides which actions
//! make sense to offer. The host re-validates every request.

use tracing::{debug, info, warn};

use crate::core::card::Card;
use crate::game::hand::Hand;
use crate::game::turn::TurnManager;
use crate::network::connection::ConnectionSession;
use crate::network::host::EMPTY_PILE_STATUS;
use crate::network::protocol::{DiscardNotice, ExitReason, Message, RosterEntry};
use crate::network::session::{RequestRejected, TurnFlags};
use crate::network::transport::{ConnectionId, Transport, TransportError, TransportEvent};

// =============================================================================
// VIEW
// =============================================================================

/// Local mirror of the room as seen by one peer.
#[derive(Debug, Clone)]
pub struct PeerView {
    username: String,
    client_id: Option<usize>,
    room_name: String,
    status: String,
    roster: TurnManager,
    arranged_seats: usize,
    active_seat: Option<usize>,
    current_player: Option<String>,
    hand: Hand,
    discards: Vec<Card>,
    deck_count: usize,
    started: bool,
    flags: TurnFlags,
    draw_pending: bool,
    is_turn: bool,
    exit: Option<ExitReason>,
}

impl PeerView {
    /// Empty mirror for `username`.
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            client_id: None,
            room_name: String::new(),
            status: String::new(),
            roster: TurnManager::default(),
            arranged_seats: 0,
            active_seat: None,
            current_player: None,
            hand: Hand::new(),
            discards: Vec::new(),
            deck_count: 0,
            started: false,
            flags: TurnFlags::default(),
            draw_pending: false,
            is_turn: false,
            exit: None,
        }
    }

    /// Apply one host message.
    pub fn apply(&mut self, message: Message) {
        match message {
            Message::RoomInfo(name) => self.room_name = name,
            Message::Status(text) => {
                if text == EMPTY_PILE_STATUS {
                    self.draw_pending = false;
                }
                self.status = text;
            }
            Message::ClientId(id) => {
                info!("{} seated at position {}", self.username, id);
                self.client_id = Some(id);
            }
            Message::PlayerManagerSync(entries) => self.sync_roster(entries),
            Message::PlayerManagerArrange(seats) => self.arranged_seats = seats,
            Message::PlayerManagerCurrentStart(position) => {
                self.active_seat = Some(position);
                if let Err(e) = self.roster.set_current(position) {
                    debug!("Active seat outside mirrored roster: {}", e);
                }
                self.current_player = self.roster.player_at(position).map(str::to_string);
                self.flags = TurnFlags::default();
                self.draw_pending = false;
                if self.client_id != Some(position) {
                    self.is_turn = false;
                }
            }
            Message::PlayerManagerCurrentEnd(position) => {
                if self.active_seat == Some(position) {
                    self.active_seat = None;
                }
            }
            Message::StartGame(decks) => {
                self.started = true;
                self.deck_count = decks;
                self.hand.clear();
                self.discards.clear();
                self.flags = TurnFlags::default();
            }
            Message::UpdateDeckCount(decks) => self.deck_count = decks,
            Message::DealCards(dealt) => {
                if dealt.username == self.username {
                    self.hand.extend(dealt.cards);
                } else {
                    warn!("Received {}'s hand", dealt.username);
                }
            }
            Message::DrawCard(drawn) => {
                self.hand.extend(drawn.cards);
                self.flags.drew = true;
                self.draw_pending = false;
            }
            Message::DiscardCard(notice) => {
                // our own discards were applied when we made them
                if notice.username.as_deref() != Some(self.username.as_str()) {
                    self.discards.push(notice.card);
                }
            }
            Message::ChangeTurn(username) => {
                if username == self.username {
                    self.is_turn = true;
                    self.flags = TurnFlags::default();
                    self.draw_pending = false;
                }
                self.current_player = Some(username);
            }
            Message::Exit(reason) => {
                info!("Game over: {:?}", reason);
                self.exit = Some(reason);
                self.is_turn = false;
            }
            other => debug!("Ignoring {} from host", other.kind()),
        }
    }

    fn sync_roster(&mut self, mut entries: Vec<RosterEntry>) {
        entries.sort_by_key(|e| e.client_id);
        let clockwise = self.roster.clockwise();
        let current = self.active_seat;
        self.roster = TurnManager::new(clockwise);
        for entry in &entries {
            let position = self.roster.add_player(&entry.username);
            if position != entry.client_id {
                warn!(
                    "Roster gap: {} listed at {} but mirrored at {}",
                    entry.username, entry.client_id, position
                );
            }
        }
        if let Some(position) = current {
            let _ = self.roster.set_current(position);
        }
    }

    /// Check whether drawing makes sense right now.
    pub fn can_draw(&self) -> Result<(), RequestRejected> {
        if !self.is_turn {
            return Err(RequestRejected::NotYourTurn(self.username.clone()));
        }
        if self.flags.drew {
            return Err(RequestRejected::AlreadyDrew);
        }
        if self.draw_pending {
            return Err(RequestRejected::DrawPending);
        }
        Ok(())
    }

    /// Check whether discarding `card` makes sense right now.
    pub fn can_discard(&self, card: Card) -> Result<(), RequestRejected> {
        if !self.is_turn {
            return Err(RequestRejected::NotYourTurn(self.username.clone()));
        }
        if self.flags.discarded {
            return Err(RequestRejected::AlreadyDiscarded);
        }
        if !self.hand.contains(card) {
            return Err(RequestRejected::CardNotInHand(card));
        }
        Ok(())
    }

    /// Check whether passing the turn makes sense right now.
    pub fn can_end_turn(&self) -> Result<(), RequestRejected> {
        if !self.is_turn {
            return Err(RequestRejected::NotYourTurn(self.username.clone()));
        }
        if !self.flags.complete() {
            return Err(RequestRejected::TurnIncomplete(self.flags));
        }
        Ok(())
    }

    /// Own username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Position assigned by the host.
    pub fn client_id(&self) -> Option<usize> {
        self.client_id
    }

    /// Room display name.
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Last status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Mirrored roster.
    pub fn roster(&self) -> &TurnManager {
        &self.roster
    }

    /// Seat count the layout was arranged for.
    pub fn arranged_seats(&self) -> usize {
        self.arranged_seats
    }

    /// Seat currently marked active.
    pub fn active_seat(&self) -> Option<usize> {
        self.active_seat
    }

    /// Who holds the turn, as last announced.
    pub fn current_player(&self) -> Option<&str> {
        self.current_player.as_deref()
    }

    /// Own hand.
    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    /// Cards other players discarded, plus our own.
    pub fn discards(&self) -> &[Card] {
        &self.discards
    }

    /// Decks in play.
    pub fn deck_count(&self) -> usize {
        self.deck_count
    }

    /// Whether the game has started.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether we hold the turn.
    pub fn is_turn(&self) -> bool {
        self.is_turn
    }

    /// Actions taken this turn.
    pub fn turn_flags(&self) -> TurnFlags {
        self.flags
    }

    /// Whether a draw request awaits its reply.
    pub fn draw_pending(&self) -> bool {
        self.draw_pending
    }

    /// Why the game ended, once it has.
    pub fn exit(&self) -> Option<ExitReason> {
        self.exit
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

/// Peer room driver.
#[derive(Debug)]
pub struct PeerDispatcher<T: Transport> {
    connections: ConnectionSession<T>,
    host: ConnectionId,
    view: PeerView,
    connected: bool,
}

impl<T: Transport> PeerDispatcher<T> {
    /// Connect to the host as `username`. The join is sent once the host
    /// accepts the connection.
    pub fn connect(transport: T, username: &str) -> Result<Self, TransportError> {
        let mut connections = ConnectionSession::new(transport);
        connections.bind()?;
        let host = connections.connect()?;
        Ok(Self {
            connections,
            host,
            view: PeerView::new(username),
            connected: false,
        })
    }

    /// One scheduler step: service the transport, then drain the host link.
    pub fn tick(&mut self) {
        self.connections.service();
        if !self.connections.contains(self.host) {
            if self.connected {
                info!("Lost connection to host");
                self.connected = false;
            }
            return;
        }
        while let Some(event) = self.connections.next_event(self.host) {
            match event {
                TransportEvent::Connected => {
                    self.connected = true;
                    let join = Message::PlayerJoin(self.view.username.clone());
                    self.send(&join);
                }
                TransportEvent::Data(bytes) => match Message::decode(&bytes) {
                    Ok(message) => self.view.apply(message),
                    Err(e) => warn!("Dropping undecodable message from host: {}", e),
                },
                TransportEvent::Disconnected => {
                    info!("Host closed the connection");
                    self.connected = false;
                    break;
                }
            }
        }
    }

    /// Ask the host for a card.
    pub fn request_draw(&mut self) -> Result<(), RequestRejected> {
        self.view.can_draw()?;
        self.view.draw_pending = true;
        let request = Message::DrawRequest(self.view.username.clone());
        self.send(&request);
        Ok(())
    }

    /// Discard `card` locally and tell the host.
    pub fn discard(&mut self, card: Card) -> Result<(), RequestRejected> {
        self.view.can_discard(card)?;
        self.view.hand.remove(card);
        self.view.discards.push(card);
        self.view.flags.discarded = true;
        let notice = Message::DiscardCard(DiscardNotice::new(card, self.view.username.as_str()));
        self.send(&notice);
        Ok(())
    }

    /// Hand the turn back to the host.
    pub fn end_turn(&mut self) -> Result<(), RequestRejected> {
        self.view.can_end_turn()?;
        self.view.is_turn = false;
        let made_move = Message::MadeMove(self.view.username.clone());
        self.send(&made_move);
        Ok(())
    }

    /// Set the local status line and send it to the host for broadcast.
    pub fn send_status(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.view.status = text.clone();
        self.send(&Message::Status(text));
    }

    /// Leave the room.
    pub fn leave(&mut self) {
        info!("{} leaving the room", self.view.username);
        self.connections.disconnect(self.host);
        self.connected = false;
    }

    fn send(&mut self, message: &Message) {
        if let Err(e) = self.connections.send(self.host, message) {
            warn!("Failed to send {} to host: {}", message.kind(), e);
        }
    }

    /// Mirrored room state.
    pub fn view(&self) -> &PeerView {
        &self.view
    }

    /// Whether the host link is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        self.connections.transport()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::card::{Rank, Suit};
    use crate::network::protocol::PlayerCards;

    fn ace() -> Card {
        Card::new(Rank::Ace, Suit::Clubs)
    }

    fn king() -> Card {
        Card::new(Rank::King, Suit::Hearts)
    }

    /// alice at position 1 of host/alice/bob, holding ace and king.
    fn seated_alice() -> PeerView {
        let mut view = PeerView::new("alice");
        view.apply(Message::ClientId(1));
        view.apply(Message::RoomInfo("host's Room".into()));
        view.apply(Message::PlayerManagerArrange(4));
        view.apply(Message::PlayerManagerSync(vec![
            RosterEntry { username: "host".into(), client_id: 0 },
            RosterEntry { username: "alice".into(), client_id: 1 },
            RosterEntry { username: "bob".into(), client_id: 2 },
        ]));
        view.apply(Message::PlayerManagerCurrentStart(0));
        view.apply(Message::StartGame(2));
        view.apply(Message::DealCards(PlayerCards {
            player_id: 1,
            username: "alice".into(),
            cards: vec![ace(), king()],
        }));
        view
    }

    #[test]
    fn test_lobby_mirror() {
        let view = seated_alice();
        assert_eq!(view.client_id(), Some(1));
        assert_eq!(view.room_name(), "host's Room");
        assert_eq!(view.arranged_seats(), 4);
        assert_eq!(view.roster().position("bob"), Some(2));
        assert_eq!(view.current_player(), Some("host"));
        assert_eq!(view.deck_count(), 2);
        assert!(view.started());
        assert_eq!(view.hand().cards(), &[ace(), king()]);
        assert!(!view.is_turn());
    }

    #[test]
    fn test_foreign_deal_ignored() {
        let mut view = seated_alice();
        view.apply(Message::DealCards(PlayerCards {
            player_id: 2,
            username: "bob".into(),
            cards: vec![ace()],
        }));
        assert_eq!(view.hand().len(), 2);
    }

    #[test]
    fn test_gates_follow_turn() {
        let mut view = seated_alice();
        assert!(matches!(view.can_draw(), Err(RequestRejected::NotYourTurn(_))));
        assert!(matches!(view.can_discard(ace()), Err(RequestRejected::NotYourTurn(_))));

        view.apply(Message::PlayerManagerCurrentEnd(0));
        view.apply(Message::PlayerManagerCurrentStart(1));
        view.apply(Message::ChangeTurn("alice".into()));
        assert!(view.is_turn());
        assert_eq!(view.active_seat(), Some(1));
        assert_eq!(view.can_draw(), Ok(()));
        assert_eq!(view.can_end_turn(), Ok(()));

        view.apply(Message::DrawCard(PlayerCards {
            player_id: 1,
            username: "alice".into(),
            cards: vec![Card::new(Rank::Two, Suit::Spades)],
        }));
        assert_eq!(view.hand().len(), 3);
        assert_eq!(view.can_draw(), Err(RequestRejected::AlreadyDrew));
        assert!(matches!(view.can_end_turn(), Err(RequestRejected::TurnIncomplete(_))));
        let missing = Card::new(Rank::Five, Suit::Diamonds);
        assert_eq!(view.can_discard(missing), Err(RequestRejected::CardNotInHand(missing)));
        assert_eq!(view.can_discard(king()), Ok(()));
    }

    #[test]
    fn test_turn_moves_away() {
        let mut view = seated_alice();
        view.apply(Message::ChangeTurn("alice".into()));
        assert!(view.is_turn());
        view.apply(Message::PlayerManagerCurrentStart(2));
        view.apply(Message::ChangeTurn("bob".into()));
        assert!(!view.is_turn());
        assert_eq!(view.current_player(), Some("bob"));
    }

    #[test]
    fn test_discards_from_others() {
        let mut view = seated_alice();
        view.apply(Message::DiscardCard(DiscardNotice::new(king(), "bob")));
        view.apply(Message::DiscardCard(DiscardNotice::new(ace(), "alice")));
        assert_eq!(view.discards(), &[king()]);
    }

    #[test]
    fn test_empty_pile_clears_pending() {
        let mut view = seated_alice();
        view.apply(Message::ChangeTurn("alice".into()));
        view.draw_pending = true;
        assert_eq!(view.can_draw(), Err(RequestRejected::DrawPending));
        view.apply(Message::Status(EMPTY_PILE_STATUS.into()));
        assert_eq!(view.can_draw(), Ok(()));
        assert_eq!(view.status(), EMPTY_PILE_STATUS);
    }

    #[test]
    fn test_exit() {
        let mut view = seated_alice();
        view.apply(Message::ChangeTurn("alice".into()));
        view.apply(Message::Exit(ExitReason::PeerLeft));
        assert_eq!(view.exit(), Some(ExitReason::PeerLeft));
        assert!(!view.is_turn());
    }

    #[test]
    fn test_resync_keeps_positions() {
        let mut view = seated_alice();
        view.apply(Message::PlayerManagerSync(vec![
            RosterEntry { username: "bob".into(), client_id: 2 },
            RosterEntry { username: "host".into(), client_id: 0 },
            RosterEntry { username: "alice".into(), client_id: 1 },
            RosterEntry { username: "carol".into(), client_id: 3 },
        ]));
        assert_eq!(view.roster().count(), 4);
        assert_eq!(view.roster().position("carol"), Some(3));
        assert_eq!(view.roster().position("host"), Some(0));
    }
}
