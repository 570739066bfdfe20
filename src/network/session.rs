//! Room Session
//!
//! The host's authoritative room state, gathered into one explicit context
//! object: settings, seat registry, turn cursor, deck pool, every hand and
//! the per-turn action flags.
//!
//! Every operation here is a pure state transition. The host dispatcher
//! decides what to send based on the returned values; nothing in this
//! module touches a connection.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::card::Card;
use crate::core::rng::{derive_room_seed, DeterministicRng};
use crate::game::deck::DeckPool;
use crate::game::hand::Hand;
use crate::game::settings::{validate_username, RoomSettings, SettingsError, MIN_PLAYERS};
use crate::game::turn::TurnManager;
use crate::network::protocol::RosterEntry;

/// Host seat.
pub const HOST_POSITION: usize = 0;

/// Room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Accepting players.
    Lobby,
    /// Game running.
    Playing,
    /// Someone left or the host closed the room.
    Ended,
}

/// What the current turn holder has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnFlags {
    /// Drew a card this turn.
    pub drew: bool,
    /// Discarded a card this turn.
    pub discarded: bool,
}

impl TurnFlags {
    /// Drawn and discarded the same number of times (both or neither).
    pub fn complete(self) -> bool {
        self.drew == self.discarded
    }
}

/// Cards dealt to one seat at game start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealtHand {
    /// Seat position.
    pub position: usize,
    /// Seat owner.
    pub username: String,
    /// Cards dealt.
    pub cards: Vec<Card>,
}

/// Outcome of a game start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealOutcome {
    /// Hands that were dealt, in position order.
    pub dealt: Vec<DealtHand>,
    /// Positions the pile could not serve.
    pub skipped: Vec<usize>,
}

/// Result of passing the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnHandoff {
    /// Position whose turn ended.
    pub ended: usize,
    /// Position now holding the turn.
    pub next: usize,
    /// Username now holding the turn.
    pub next_player: String,
}

/// Authoritative room state.
#[derive(Debug)]
pub struct RoomSession {
    settings: RoomSettings,
    join_code: String,
    host_name: String,
    phase: RoomPhase,
    turns: TurnManager,
    deck: DeckPool,
    hands: BTreeMap<usize, Hand>,
    flags: TurnFlags,
    games_started: u64,
}

impl RoomSession {
    /// Open a room with `host_name` seated at position 0.
    pub fn new(
        settings: RoomSettings,
        host_name: &str,
        join_code: &str,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        validate_username(host_name)?;

        let mut turns = TurnManager::new(settings.clockwise);
        turns.add_player(host_name);

        let mut hands = BTreeMap::new();
        hands.insert(HOST_POSITION, Hand::new());

        Ok(Self {
            deck: DeckPool::new(settings.deck_count),
            settings,
            join_code: join_code.to_string(),
            host_name: host_name.to_string(),
            phase: RoomPhase::Lobby,
            turns,
            hands,
            flags: TurnFlags::default(),
            games_started: 0,
        })
    }

    // =========================================================================
    // LOBBY
    // =========================================================================

    /// Seat a new player.
    pub fn register(&mut self, username: &str) -> Result<usize, RequestRejected> {
        if self.phase != RoomPhase::Lobby {
            return Err(RequestRejected::GameInProgress);
        }
        validate_username(username)?;
        if self.turns.position(username).is_some() {
            return Err(RequestRejected::UsernameTaken(username.to_string()));
        }
        if self.turns.count() >= self.settings.max_players {
            return Err(RequestRejected::RoomFull(self.settings.max_players));
        }
        let position = self.turns.add_player(username);
        self.hands.insert(position, Hand::new());
        info!("{} seated at position {}", username, position);
        Ok(position)
    }

    /// Shuffle, deal and hand the turn to the host.
    pub fn start_game(&mut self) -> Result<DealOutcome, SessionError> {
        match self.phase {
            RoomPhase::Lobby => {}
            RoomPhase::Playing => return Err(SessionError::AlreadyStarted),
            RoomPhase::Ended => return Err(SessionError::RoomClosed),
        }
        let players = self.turns.count();
        if players < MIN_PLAYERS {
            return Err(SessionError::NotEnoughPlayers {
                have: players,
                need: MIN_PLAYERS,
            });
        }

        self.deck.reset(self.settings.deck_count);
        let mut rng = self.game_rng();
        self.deck.shuffle_for_deal(&mut rng);
        self.games_started += 1;

        let mut outcome = DealOutcome {
            dealt: Vec::with_capacity(players),
            skipped: Vec::new(),
        };
        for position in 0..players {
            let hand = self.hands.entry(position).or_default();
            hand.clear();
            match self.deck.deal(self.settings.cards_per_hand) {
                Some(cards) => {
                    hand.extend(cards.iter().copied());
                    outcome.dealt.push(DealtHand {
                        position,
                        username: self.turns.player_at(position).unwrap_or_default().to_string(),
                        cards,
                    });
                }
                None => {
                    warn!(
                        "Draw pile too small to deal {} cards to position {}",
                        self.settings.cards_per_hand, position
                    );
                    outcome.skipped.push(position);
                }
            }
        }

        // Cursor always starts on the host.
        if let Err(e) = self.turns.set_current(HOST_POSITION) {
            warn!("Failed to reset turn cursor: {}", e);
        }
        self.flags = TurnFlags::default();
        self.phase = RoomPhase::Playing;
        info!(
            "Game {} started: {} players, {} decks, {} cards left",
            self.games_started,
            players,
            self.settings.deck_count,
            self.deck.len()
        );
        Ok(outcome)
    }

    fn game_rng(&self) -> DeterministicRng {
        match self.settings.seed {
            Some(seed) => {
                let players: Vec<&str> = self.turns.players().collect();
                DeterministicRng::new(derive_room_seed(
                    &self.join_code,
                    &players,
                    seed.wrapping_add(self.games_started),
                ))
            }
            None => DeterministicRng::from_entropy(),
        }
    }

    // =========================================================================
    // TURN ACTIONS
    // =========================================================================

    fn check_turn(&self, username: &str) -> Result<usize, RequestRejected> {
        if self.phase != RoomPhase::Playing {
            return Err(RequestRejected::GameNotRunning);
        }
        let position = self
            .turns
            .position(username)
            .ok_or_else(|| RequestRejected::UnknownPlayer(username.to_string()))?;
        if !self.turns.is_turn(username) {
            return Err(RequestRejected::NotYourTurn(username.to_string()));
        }
        Ok(position)
    }

    /// Draw the top card for `username`.
    pub fn draw(&mut self, username: &str) -> Result<Card, RequestRejected> {
        let position = self.check_turn(username)?;
        if self.flags.drew {
            return Err(RequestRejected::AlreadyDrew);
        }
        let card = self.deck.draw().ok_or(RequestRejected::EmptyPile)?;
        self.hands.entry(position).or_default().add(card);
        self.flags.drew = true;
        debug!("{} drew {} ({} left)", username, card, self.deck.len());
        Ok(card)
    }

    /// Move `card` from the hand of `username` to the discard pile.
    pub fn discard(&mut self, username: &str, card: Card) -> Result<(), RequestRejected> {
        let position = self.check_turn(username)?;
        if self.flags.discarded {
            return Err(RequestRejected::AlreadyDiscarded);
        }
        let removed = self
            .hands
            .get_mut(&position)
            .map_or(false, |hand| hand.remove(card));
        if !removed {
            return Err(RequestRejected::CardNotInHand(card));
        }
        self.deck.discard(card);
        self.flags.discarded = true;
        debug!("{} discarded {}", username, card);
        Ok(())
    }

    /// Pass the turn on. Only allowed once the turn is complete.
    pub fn end_turn(&mut self, username: &str) -> Result<TurnHandoff, RequestRejected> {
        let ended = self.check_turn(username)?;
        if !self.flags.complete() {
            return Err(RequestRejected::TurnIncomplete(self.flags));
        }
        self.turns.next_turn();
        self.flags = TurnFlags::default();
        let next = self.turns.current_position();
        let next_player = self.turns.current_player().unwrap_or_default().to_string();
        debug!("Turn passed from {} to {}", username, next_player);
        Ok(TurnHandoff {
            ended,
            next,
            next_player,
        })
    }

    /// Close the room for good.
    pub fn end(&mut self) {
        if self.phase != RoomPhase::Ended {
            info!("Room {} ended", self.join_code);
            self.phase = RoomPhase::Ended;
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Room settings.
    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Relay join code.
    pub fn join_code(&self) -> &str {
        &self.join_code
    }

    /// Host username.
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Display name of the room.
    pub fn room_name(&self) -> String {
        self.settings.display_name(&self.host_name)
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Seat registry and turn cursor.
    pub fn turns(&self) -> &TurnManager {
        &self.turns
    }

    /// Draw and discard piles.
    pub fn deck(&self) -> &DeckPool {
        &self.deck
    }

    /// Hand held at `position`.
    pub fn hand(&self, position: usize) -> Option<&Hand> {
        self.hands.get(&position)
    }

    /// Hand held by `username`.
    pub fn hand_of(&self, username: &str) -> Option<&Hand> {
        self.turns.position(username).and_then(|p| self.hands.get(&p))
    }

    /// Flags of the current turn.
    pub fn turn_flags(&self) -> TurnFlags {
        self.flags
    }

    /// Roster in position order.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.turns
            .players()
            .enumerate()
            .map(|(client_id, username)| RosterEntry {
                username: username.to_string(),
                client_id,
            })
            .collect()
    }

    /// Cards accounted for across the draw pile, every hand and the
    /// discard pile. Equals [`DeckPool::total`] while the room is sound.
    pub fn cards_in_play(&self) -> usize {
        self.deck.len()
            + self.hands.values().map(Hand::len).sum::<usize>()
            + self.deck.discard_pile().len()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Start-game precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A game is already running.
    #[error("game already started")]
    AlreadyStarted,

    /// The room has ended.
    #[error("room is closed")]
    RoomClosed,

    /// Too few seated players.
    #[error("need at least {need} players to start, have {have}")]
    NotEnoughPlayers {
        /// Seated players.
        have: usize,
        /// Required players.
        need: usize,
    },
}

/// Protocol-soft rejections. Logged and dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestRejected {
    /// No game is running.
    #[error("no game is running")]
    GameNotRunning,

    /// The game has already started.
    #[error("the game has already started")]
    GameInProgress,

    /// Username failed validation.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] SettingsError),

    /// Username already seated.
    #[error("username '{0}' is taken")]
    UsernameTaken(String),

    /// Every seat is filled.
    #[error("room is full ({0} players)")]
    RoomFull(usize),

    /// Username not seated.
    #[error("unknown player '{0}'")]
    UnknownPlayer(String),

    /// Connection never joined.
    #[error("connection has not joined the room")]
    NotJoined,

    /// Payload names someone other than the sender.
    #[error("'{claimed}' does not match sender '{registered}'")]
    IdentityMismatch {
        /// Name inside the payload.
        claimed: String,
        /// Name registered for the connection.
        registered: String,
    },

    /// Sender does not hold the turn.
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),

    /// Already drew this turn.
    #[error("already drew this turn")]
    AlreadyDrew,

    /// A draw is already in flight.
    #[error("a draw request is already pending")]
    DrawPending,

    /// Already discarded this turn.
    #[error("already discarded this turn")]
    AlreadyDiscarded,

    /// Card is not in the sender's hand.
    #[error("{0} is not in hand")]
    CardNotInHand(Card),

    /// Nothing left to draw.
    #[error("the draw pile is empty")]
    EmptyPile,

    /// Drew without discarding or the reverse.
    #[error("turn incomplete (drew: {}, discarded: {})", .0.drew, .0.discarded)]
    TurnIncomplete(TurnFlags),
}

// =============================================================================
// TESTS
// =============================================================================
