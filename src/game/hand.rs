//! Player Hands

use crate::core::card::Card;

/// Cards held by one player, in the order received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    /// Empty hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a card to the end of the hand.
    pub fn add(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Add several cards in order.
    pub fn extend(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards.extend(cards);
    }

    /// Remove one instance of `card`. Returns `false` if it isn't held.
    pub fn remove(&mut self, card: Card) -> bool {
        match self.cards.iter().position(|c| *c == card) {
            Some(index) => {
                self.cards.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether at least one instance of `card` is held.
    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    /// First card held.
    pub fn first(&self) -> Option<Card> {
        self.cards.first().copied()
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the hand is empty.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Held cards in order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Drop every card.
    pub fn clear(&mut self) {
        self.cards.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::card::{Rank, Suit};

    #[test]
    fn test_remove_single_duplicate() {
        let ace = Card::new(Rank::Ace, Suit::Clubs);
        let mut hand = Hand::new();
        hand.extend([ace, Card::new(Rank::Two, Suit::Hearts), ace]);

        assert!(hand.remove(ace));
        assert_eq!(hand.len(), 2);
        assert!(hand.contains(ace));
        assert_eq!(hand.first(), Some(Card::new(Rank::Two, Suit::Hearts)));

        assert!(hand.remove(ace));
        assert!(!hand.remove(ace));
        assert!(!hand.contains(ace));
    }

    #[test]
    fn test_clear() {
        let mut hand = Hand::new();
        hand.add(Card::new(Rank::King, Suit::Spades));
        assert!(!hand.is_empty());
        hand.clear();
        assert!(hand.is_empty());
        assert_eq!(hand.first(), None);
    }
}
