//! Card Values
//!
//! Immutable suit/rank pairs. A card has no identity beyond its value, so
//! multi-deck rooms legitimately hold duplicates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// SUIT
// =============================================================================

/// Card suit (wire value 0-3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Suit {
    /// ♣
    Clubs = 0,
    /// ♦
    Diamonds = 1,
    /// ♥
    Hearts = 2,
    /// ♠
    Spades = 3,
}

impl Suit {
    /// All suits in deck order.
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    /// Get suit from its wire value (0-3).
    pub fn from_index(index: u8) -> Option<Suit> {
        match index {
            0 => Some(Suit::Clubs),
            1 => Some(Suit::Diamonds),
            2 => Some(Suit::Hearts),
            3 => Some(Suit::Spades),
            _ => None,
        }
    }

    /// Display name used in discard payloads ("Clubs").
    pub fn name(self) -> &'static str {
        match self {
            Suit::Clubs => "Clubs",
            Suit::Diamonds => "Diamonds",
            Suit::Hearts => "Hearts",
            Suit::Spades => "Spades",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suit {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Suit::ALL
            .into_iter()
            .find(|suit| suit.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CardError::UnknownSuitName(trimmed.to_string()))
    }
}

// =============================================================================
// RANK
// =============================================================================

/// Card rank (wire value 1-13, Ace low).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Rank {
    /// 1
    Ace = 1,
    /// 2
    Two = 2,
    /// 3
    Three = 3,
    /// 4
    Four = 4,
    /// 5
    Five = 5,
    /// 6
    Six = 6,
    /// 7
    Seven = 7,
    /// 8
    Eight = 8,
    /// 9
    Nine = 9,
    /// 10
    Ten = 10,
    /// 11
    Jack = 11,
    /// 12
    Queen = 12,
    /// 13
    King = 13,
}

impl Rank {
    /// All ranks in deck order.
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Get rank from its wire value (1-13).
    pub fn from_value(value: u8) -> Option<Rank> {
        if (1..=13).contains(&value) {
            Some(Rank::ALL[(value - 1) as usize])
        } else {
            None
        }
    }

    /// Display name used in discard payloads ("Ace").
    pub fn name(self) -> &'static str {
        match self {
            Rank::Ace => "Ace",
            Rank::Two => "Two",
            Rank::Three => "Three",
            Rank::Four => "Four",
            Rank::Five => "Five",
            Rank::Six => "Six",
            Rank::Seven => "Seven",
            Rank::Eight => "Eight",
            Rank::Nine => "Nine",
            Rank::Ten => "Ten",
            Rank::Jack => "Jack",
            Rank::Queen => "Queen",
            Rank::King => "King",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rank {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Rank::ALL
            .into_iter()
            .find(|rank| rank.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CardError::UnknownRankName(trimmed.to_string()))
    }
}

// =============================================================================
// CARD
// =============================================================================

/// A playing card.
///
/// Serializes through [`WireCard`] so card lists keep the `{"Suit":0,"Rank":1}`
/// record shape on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireCard", into = "WireCard")]
pub struct Card {
    /// Card suit.
    pub suit: Suit,
    /// Card rank.
    pub rank: Rank,
}

impl Card {
    /// Create a card.
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }

    /// Card at `index` (0-51) of an unshuffled deck: suit-major, rank-minor.
    pub fn from_index(index: usize) -> Option<Card> {
        if index >= 52 {
            return None;
        }
        let suit = Suit::from_index((index / 13) as u8)?;
        let rank = Rank::from_value((index % 13 + 1) as u8)?;
        Some(Card { suit, rank })
    }

    /// Position of this card in an unshuffled deck.
    pub fn index(self) -> usize {
        self.suit as usize * 13 + self.rank as usize - 1
    }

    /// One unshuffled 52-card deck.
    pub fn standard_deck() -> Vec<Card> {
        Suit::ALL
            .into_iter()
            .flat_map(|suit| Rank::ALL.into_iter().map(move |rank| Card { suit, rank }))
            .collect()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

/// Wire record for a card inside structured payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCard {
    /// Suit value 0-3.
    #[serde(rename = "Suit")]
    pub suit: u8,
    /// Rank value 1-13.
    #[serde(rename = "Rank")]
    pub rank: u8,
}

impl From<Card> for WireCard {
    fn from(card: Card) -> Self {
        Self {
            suit: card.suit as u8,
            rank: card.rank as u8,
        }
    }
}

impl TryFrom<WireCard> for Card {
    type Error = CardError;

    fn try_from(wire: WireCard) -> Result<Self, Self::Error> {
        let suit = Suit::from_index(wire.suit).ok_or(CardError::InvalidSuit(wire.suit))?;
        let rank = Rank::from_value(wire.rank).ok_or(CardError::InvalidRank(wire.rank))?;
        Ok(Card { suit, rank })
    }
}

/// Card parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    /// Suit value outside 0-3.
    #[error("invalid suit value {0}")]
    InvalidSuit(u8),

    /// Rank value outside 1-13.
    #[error("invalid rank value {0}")]
    InvalidRank(u8),

    /// Unrecognized suit name.
    #[error("unknown suit name '{0}'")]
    UnknownSuitName(String),

    /// Unrecognized rank name.
    #[error("unknown rank name '{0}'")]
    UnknownRankName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_mapping() {
        assert_eq!(Card::from_index(0), Some(Card::new(Rank::Ace, Suit::Clubs)));
        assert_eq!(Card::from_index(12), Some(Card::new(Rank::King, Suit::Clubs)));
        assert_eq!(Card::from_index(13), Some(Card::new(Rank::Ace, Suit::Diamonds)));
        assert_eq!(Card::from_index(51), Some(Card::new(Rank::King, Suit::Spades)));
        assert_eq!(Card::from_index(52), None);

        for i in 0..52 {
            assert_eq!(Card::from_index(i).unwrap().index(), i);
        }
    }

    #[test]
    fn test_standard_deck_order() {
        let deck = Card::standard_deck();
        assert_eq!(deck.len(), 52);
        for (i, card) in deck.iter().enumerate() {
            assert_eq!(Card::from_index(i), Some(*card));
        }
    }

    #[test]
    fn test_names_parse_case_insensitive() {
        assert_eq!("Ace".parse::<Rank>().unwrap(), Rank::Ace);
        assert_eq!("king".parse::<Rank>().unwrap(), Rank::King);
        assert_eq!(" Clubs ".parse::<Suit>().unwrap(), Suit::Clubs);
        assert!(matches!("Joker".parse::<Rank>(), Err(CardError::UnknownRankName(_))));
        assert!(matches!("Stars".parse::<Suit>(), Err(CardError::UnknownSuitName(_))));
    }

    #[test]
    fn test_wire_shape() {
        let card = Card::new(Rank::Queen, Suit::Hearts);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, r#"{"Suit":2,"Rank":12}"#);

        let parsed: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, card);
    }

    #[test]
    fn test_wire_rejects_out_of_range() {
        assert!(serde_json::from_str::<Card>(r#"{"Suit":4,"Rank":1}"#).is_err());
        assert!(serde_json::from_str::<Card>(r#"{"Suit":0,"Rank":0}"#).is_err());
        assert!(serde_json::from_str::<Card>(r#"{"Suit":0,"Rank":14}"#).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Card::new(Rank::Ten, Suit::Spades).to_string(), "Ten of Spades");
    }
}
