//! Protocol Messages
//!
//! Wire format for host/peer communication. Every message travels as a JSON
//! envelope `{"type": "<tag>", "value": "<payload>"}` where the payload is
//! always a string. Structured payloads (card lists, roster records) are
//! themselves JSON inside that string.
//!
//! Decoding happens once at the boundary: dispatchers only ever see a typed
//! [`Message`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::card::{Card, CardError, Rank, Suit};

// =============================================================================
// MESSAGES
// =============================================================================

/// Every message exchanged between host and peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Peer -> host: join with a username.
    PlayerJoin(String),
    /// Host -> peer: room display name.
    RoomInfo(String),
    /// Both ways: free-text status line.
    Status(String),
    /// Host -> peer: the peer's position.
    ClientId(usize),
    /// Host -> peer: full roster snapshot.
    PlayerManagerSync(Vec<RosterEntry>),
    /// Host -> peer: seat layout for this many players.
    PlayerManagerArrange(usize),
    /// Host -> peer: seat at this position became active.
    PlayerManagerCurrentStart(usize),
    /// Host -> peer: seat at this position became inactive.
    PlayerManagerCurrentEnd(usize),
    /// Host -> peer: game started with this many decks.
    StartGame(usize),
    /// Host -> peer: refresh deck count.
    UpdateDeckCount(usize),
    /// Host -> one peer: initial hand.
    DealCards(PlayerCards),
    /// Peer -> host: draw a card for this username.
    DrawRequest(String),
    /// Host -> one peer: the drawn card.
    DrawCard(PlayerCards),
    /// Both ways: a card was discarded.
    DiscardCard(DiscardNotice),
    /// Host -> peer: this username now holds the turn.
    ChangeTurn(String),
    /// Peer -> host: this username ended its turn.
    MadeMove(String),
    /// Host -> peer: the game is over.
    Exit(ExitReason),
}

impl Message {
    /// Wire tag for this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PlayerJoin(_) => "player-join",
            Message::RoomInfo(_) => "room-info",
            Message::Status(_) => "status",
            Message::ClientId(_) => "clientID",
            Message::PlayerManagerSync(_) => "player-manager-sync",
            Message::PlayerManagerArrange(_) => "player-manager-arrange",
            Message::PlayerManagerCurrentStart(_) => "player-manager-current-start",
            Message::PlayerManagerCurrentEnd(_) => "player-manager-current-end",
            Message::StartGame(_) => "start-game",
            Message::UpdateDeckCount(_) => "update-deck-count",
            Message::DealCards(_) => "deal-cards",
            Message::DrawRequest(_) => "draw-request",
            Message::DrawCard(_) => "draw-card",
            Message::DiscardCard(_) => "discard-card",
            Message::ChangeTurn(_) => "change-turn",
            Message::MadeMove(_) => "made-move",
            Message::Exit(_) => "exit",
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let envelope = Envelope {
            kind: self.kind().to_string(),
            value: self.payload()?,
        };
        serde_json::to_vec(&envelope).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;
        Self::from_envelope(envelope)
    }

    fn payload(&self) -> Result<String, CodecError> {
        let value = match self {
            Message::PlayerJoin(s)
            | Message::RoomInfo(s)
            | Message::Status(s)
            | Message::DrawRequest(s)
            | Message::ChangeTurn(s)
            | Message::MadeMove(s) => s.clone(),
            Message::ClientId(n)
            | Message::PlayerManagerArrange(n)
            | Message::PlayerManagerCurrentStart(n)
            | Message::PlayerManagerCurrentEnd(n)
            | Message::StartGame(n)
            | Message::UpdateDeckCount(n) => n.to_string(),
            Message::PlayerManagerSync(entries) => {
                if let Some(entry) = entries.iter().find(|e| e.username.contains(ROSTER_SEPARATOR)) {
                    return Err(CodecError::Encode(format!(
                        "roster name '{}' contains '{}'",
                        entry.username, ROSTER_SEPARATOR
                    )));
                }
                let records = entries
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                records.join(&ROSTER_SEPARATOR.to_string())
            }
            Message::DealCards(cards) | Message::DrawCard(cards) => {
                serde_json::to_string(cards).map_err(|e| CodecError::Encode(e.to_string()))?
            }
            Message::DiscardCard(notice) => {
                match notice.username.as_deref() {
                    Some(name) if name.is_empty() || name.trim() != name => {
                        return Err(CodecError::Encode(format!(
                            "discard username '{}' is empty or padded",
                            name
                        )));
                    }
                    _ => notice.to_string(),
                }
            }
            Message::Exit(reason) => reason.code().to_string(),
        };
        Ok(value)
    }

    fn from_envelope(envelope: Envelope) -> Result<Message, CodecError> {
        let Envelope { kind, value } = envelope;
        let message = match kind.as_str() {
            "player-join" => Message::PlayerJoin(value),
            "room-info" => Message::RoomInfo(value),
            "status" => Message::Status(value),
            "draw-request" => Message::DrawRequest(value),
            "change-turn" => Message::ChangeTurn(value),
            "made-move" => Message::MadeMove(value),
            "clientID" => Message::ClientId(parse_number("clientID", &value)?),
            "player-manager-arrange" => {
                Message::PlayerManagerArrange(parse_number("player-manager-arrange", &value)?)
            }
            "player-manager-current-start" => Message::PlayerManagerCurrentStart(parse_number(
                "player-manager-current-start",
                &value,
            )?),
            "player-manager-current-end" => {
                Message::PlayerManagerCurrentEnd(parse_number("player-manager-current-end", &value)?)
            }
            "start-game" => Message::StartGame(parse_number("start-game", &value)?),
            "update-deck-count" => {
                Message::UpdateDeckCount(parse_number("update-deck-count", &value)?)
            }
            "player-manager-sync" => Message::PlayerManagerSync(parse_roster(&value)?),
            "deal-cards" => Message::DealCards(parse_cards("deal-cards", &value)?),
            "draw-card" => Message::DrawCard(parse_cards("draw-card", &value)?),
            "discard-card" => Message::DiscardCard(value.parse()?),
            "exit" => Message::Exit(value.parse()?),
            _ => return Err(CodecError::UnknownType(kind)),
        };
        Ok(message)
    }
}

/// Separates roster records in a `player-manager-sync` payload.
const ROSTER_SEPARATOR: char = ';';

/// Wire envelope.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

fn parse_number(kind: &'static str, value: &str) -> Result<usize, CodecError> {
    value.trim().parse().map_err(|_| CodecError::Payload {
        kind,
        reason: format!("expected an integer, got '{}'", value),
    })
}

fn parse_roster(value: &str) -> Result<Vec<RosterEntry>, CodecError> {
    value
        .split(ROSTER_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            serde_json::from_str(record).map_err(|e| CodecError::Payload {
                kind: "player-manager-sync",
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_cards(kind: &'static str, value: &str) -> Result<PlayerCards, CodecError> {
    serde_json::from_str(value).map_err(|e| CodecError::Payload {
        kind,
        reason: e.to_string(),
    })
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// One roster record: `{"username":"alice","clientId":1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Player name.
    pub username: String,
    /// Player position.
    #[serde(rename = "clientId")]
    pub client_id: usize,
}

/// Cards addressed to one player (deal or draw).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCards {
    /// Recipient position.
    #[serde(rename = "PlayerID")]
    pub player_id: usize,
    /// Recipient name.
    #[serde(rename = "Username")]
    pub username: String,
    /// The cards, in order.
    #[serde(rename = "Cards")]
    pub cards: Vec<Card>,
}

/// A discarded card: `Rank,Suit[,username]`, names spelled out
/// (`"Ace,Clubs,alice"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardNotice {
    /// The card.
    pub card: Card,
    /// Who discarded it, when known.
    pub username: Option<String>,
}

impl DiscardNotice {
    /// Notice for `card` discarded by `username`.
    pub fn new(card: Card, username: impl Into<String>) -> Self {
        Self {
            card,
            username: Some(username.into()),
        }
    }
}

impl fmt::Display for DiscardNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.card.rank, self.card.suit)?;
        if let Some(name) = &self.username {
            write!(f, ",{}", name)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DiscardNotice {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: String| CodecError::Payload {
            kind: "discard-card",
            reason,
        };
        let mut parts = s.splitn(3, ',');
        let rank: Rank = parts
            .next()
            .unwrap_or_default()
            .parse()
            .map_err(|e: CardError| bad(e.to_string()))?;
        let suit: Suit = parts
            .next()
            .ok_or_else(|| bad(format!("missing suit in '{}'", s)))?
            .parse()
            .map_err(|e: CardError| bad(e.to_string()))?;
        let username = parts
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(Self {
            card: Card::new(rank, suit),
            username,
        })
    }
}

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The host closed the room (`"0"`).
    HostLeft,
    /// A peer left the room (`"1"`).
    PeerLeft,
}

impl ExitReason {
    /// Wire code.
    pub fn code(self) -> &'static str {
        match self {
            ExitReason::HostLeft => "0",
            ExitReason::PeerLeft => "1",
        }
    }
}

impl std::str::FromStr for ExitReason {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(ExitReason::HostLeft),
            "1" => Ok(ExitReason::PeerLeft),
            other => Err(CodecError::Payload {
                kind: "exit",
                reason: format!("unknown exit code '{}'", other),
            }),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Codec failures. Inbound failures are dropped by the dispatchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Zero-length input.
    #[error("empty message")]
    Empty,

    /// Not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Envelope tag not recognised.
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// Payload does not match the tag's schema.
    #[error("bad {kind} payload: {reason}")]
    Payload {
        /// Message tag.
        kind: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Serialization failed.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ace_of_clubs() -> Card {
        Card::new(Rank::Ace, Suit::Clubs)
    }

    #[test]
    fn test_envelope_shape() {
        let bytes = Message::Status("hello".into()).encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"type":"status","value":"hello"}"#
        );
    }

    #[test]
    fn test_client_id_tag() {
        let bytes = Message::ClientId(2).encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"type":"clientID","value":"2"}"#
        );
    }

    #[test]
    fn test_roster_payload() {
        let msg = Message::PlayerManagerSync(vec![
            RosterEntry { username: "host".into(), client_id: 0 },
            RosterEntry { username: "alice".into(), client_id: 1 },
        ]);
        assert_eq!(
            msg.payload().unwrap(),
            r#"{"username":"host","clientId":0};{"username":"alice","clientId":1}"#
        );
        assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_empty_roster() {
        let msg = Message::PlayerManagerSync(Vec::new());
        assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_player_cards_payload() {
        let cards = PlayerCards {
            player_id: 1,
            username: "alice".into(),
            cards: vec![ace_of_clubs(), Card::new(Rank::Queen, Suit::Hearts)],
        };
        let msg = Message::DealCards(cards);
        assert_eq!(
            msg.payload().unwrap(),
            r#"{"PlayerID":1,"Username":"alice","Cards":[{"Suit":0,"Rank":1},{"Suit":2,"Rank":12}]}"#
        );
        assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_discard_payload() {
        let notice: DiscardNotice = "Ace,Clubs".parse().unwrap();
        assert_eq!(notice.card, ace_of_clubs());
        assert_eq!(notice.username, None);

        let notice: DiscardNotice = "Ten,Spades,alice".parse().unwrap();
        assert_eq!(notice.card, Card::new(Rank::Ten, Suit::Spades));
        assert_eq!(notice.username.as_deref(), Some("alice"));
        assert_eq!(notice.to_string(), "Ten,Spades,alice");

        assert!("Ace".parse::<DiscardNotice>().is_err());
        assert!("Joker,Clubs".parse::<DiscardNotice>().is_err());
    }

    #[test]
    fn test_unrepresentable_payloads_refused() {
        let sync = Message::PlayerManagerSync(vec![RosterEntry {
            username: "a;b".into(),
            client_id: 1,
        }]);
        assert!(matches!(sync.encode(), Err(CodecError::Encode(_))));

        for name in [" bob", "bob ", ""] {
            let discard = Message::DiscardCard(DiscardNotice::new(ace_of_clubs(), name));
            assert!(matches!(discard.encode(), Err(CodecError::Encode(_))), "{:?}", name);
        }

        let discard = Message::DiscardCard(DiscardNotice::new(ace_of_clubs(), "b,o b"));
        let bytes = discard.encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), discard);
    }

    #[test]
    fn test_exit_codes() {
        let bytes = Message::Exit(ExitReason::PeerLeft).encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"type":"exit","value":"1"}"#
        );
        assert!(matches!(
            Message::decode(br#"{"type":"exit","value":"7"}"#),
            Err(CodecError::Payload { kind: "exit", .. })
        ));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Message::decode(b""), Err(CodecError::Empty));
        assert!(matches!(Message::decode(b"{\"type\":"), Err(CodecError::Malformed(_))));
        assert!(matches!(Message::decode(b"\xff\xfe"), Err(CodecError::Malformed(_))));
        assert_eq!(
            Message::decode(br#"{"type":"teleport","value":""}"#),
            Err(CodecError::UnknownType("teleport".into()))
        );
        assert!(matches!(
            Message::decode(br#"{"type":"clientID","value":"two"}"#),
            Err(CodecError::Payload { kind: "clientID", .. })
        ));
        assert!(matches!(
            Message::decode(br#"{"type":"draw-card","value":"{\"PlayerID\":0}"}"#),
            Err(CodecError::Payload { kind: "draw-card", .. })
        ));
    }

    fn card() -> impl Strategy<Value = Card> {
        (0usize..52).prop_map(|i| Card::from_index(i).unwrap())
    }

    fn username() -> impl Strategy<Value = String> {
        prop_oneof![
            3 => "[a-zA-Z0-9_@#]{1,12}",
            1 => "[ a-z;,]{0,6}",
            1 => any::<String>(),
        ]
    }

    fn text_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            username().prop_map(Message::PlayerJoin),
            any::<String>().prop_map(Message::RoomInfo),
            any::<String>().prop_map(Message::Status),
            (0usize..10).prop_map(Message::ClientId),
            proptest::collection::vec((username(), 0usize..10), 0..10).prop_map(|v| {
                Message::PlayerManagerSync(
                    v.into_iter()
                        .map(|(username, client_id)| RosterEntry { username, client_id })
                        .collect(),
                )
            }),
            (2usize..=10).prop_map(Message::PlayerManagerArrange),
            (0usize..10).prop_map(Message::PlayerManagerCurrentStart),
            (0usize..10).prop_map(Message::PlayerManagerCurrentEnd),
            (1usize..=10).prop_map(Message::StartGame),
            (1usize..=10).prop_map(Message::UpdateDeckCount),
        ]
    }

    fn play_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            (0usize..10, username(), proptest::collection::vec(card(), 0..8)).prop_map(
                |(player_id, username, cards)| {
                    Message::DealCards(PlayerCards { player_id, username, cards })
                }
            ),
            username().prop_map(Message::DrawRequest),
            (0usize..10, username(), card()).prop_map(|(player_id, username, c)| {
                Message::DrawCard(PlayerCards { player_id, username, cards: vec![c] })
            }),
            (card(), proptest::option::of(username()))
                .prop_map(|(card, username)| Message::DiscardCard(DiscardNotice { card, username })),
            username().prop_map(Message::ChangeTurn),
            username().prop_map(Message::MadeMove),
            prop_oneof![Just(ExitReason::HostLeft), Just(ExitReason::PeerLeft)]
                .prop_map(Message::Exit),
        ]
    }

    fn message() -> impl Strategy<Value = Message> {
        prop_oneof![text_message(), play_message()]
    }

    proptest! {
        #[test]
        fn prop_codec_round_trip(msg in message()) {
            match msg.encode() {
                Ok(bytes) => prop_assert_eq!(Message::decode(&bytes).unwrap(), msg),
                Err(e) => prop_assert!(matches!(e, CodecError::Encode(_)), "{:?}", e),
            }
        }
    }
}
