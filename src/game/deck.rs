//! Deck Pool
//!
//! Draw pile and discard pile for a room. `deck_count` standard decks are
//! concatenated into one backing sequence; every operation (deal, draw,
//! removal by value) works on that same sequence so there is a single
//! source of truth for "cards not yet in play".
//!
//! Before shuffling, drawing from the front visits the first sub-deck to
//! completion, then the next, and so on. After `shuffle_for_deal` the same
//! pile is consumed in shuffled order.

use std::collections::VecDeque;

use tracing::debug;

use crate::core::card::{Card, Rank, Suit};
use crate::core::rng::DeterministicRng;
use crate::CARDS_PER_DECK;

/// Draw pile plus discard pile over `deck_count` merged decks.
#[derive(Debug, Clone)]
pub struct DeckPool {
    deck_count: usize,
    draw_pile: VecDeque<Card>,
    discard_pile: Vec<Card>,
}

impl DeckPool {
    /// Build `deck_count` unshuffled decks in registration order.
    pub fn new(deck_count: usize) -> Self {
        let mut pool = Self {
            deck_count,
            draw_pile: VecDeque::new(),
            discard_pile: Vec::new(),
        };
        pool.reset(deck_count);
        pool
    }

    /// Discard everything and rebuild for a new game.
    pub fn reset(&mut self, deck_count: usize) {
        self.deck_count = deck_count;
        self.discard_pile.clear();
        self.draw_pile = (0..deck_count)
            .flat_map(|_| Card::standard_deck())
            .collect();
        debug!("Deck pool reset with {} decks ({} cards)", deck_count, self.draw_pile.len());
    }

    /// Shuffle the draw pile in place (unbiased Fisher-Yates).
    pub fn shuffle_for_deal(&mut self, rng: &mut DeterministicRng) {
        rng.shuffle(self.draw_pile.make_contiguous());
    }

    /// Take `n` cards off the front.
    ///
    /// Returns `None` and leaves the pile untouched if fewer than `n` remain.
    pub fn deal(&mut self, n: usize) -> Option<Vec<Card>> {
        if self.draw_pile.len() < n {
            return None;
        }
        Some(self.draw_pile.drain(..n).collect())
    }

    /// Take the front card.
    pub fn draw(&mut self) -> Option<Card> {
        self.draw_pile.pop_front()
    }

    /// Move one card matching `(rank, suit)` from the draw pile to the
    /// discard pile. With several decks, the first match is taken.
    pub fn remove_by_value(&mut self, rank: Rank, suit: Suit) -> Option<Card> {
        let index = self
            .draw_pile
            .iter()
            .position(|c| c.rank == rank && c.suit == suit)?;
        let card = self.draw_pile.remove(index)?;
        self.discard_pile.push(card);
        Some(card)
    }

    /// Append a card that left a hand.
    pub fn discard(&mut self, card: Card) {
        self.discard_pile.push(card);
    }

    /// Cards left to draw.
    pub fn len(&self) -> usize {
        self.draw_pile.len()
    }

    /// Whether the draw pile is exhausted.
    pub fn is_empty(&self) -> bool {
        self.draw_pile.is_empty()
    }

    /// Draw pile, front first.
    pub fn draw_pile(&self) -> impl Iterator<Item = &Card> {
        self.draw_pile.iter()
    }

    /// Discarded cards, oldest first.
    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    /// Most recent discard.
    pub fn top_discard(&self) -> Option<Card> {
        self.discard_pile.last().copied()
    }

    /// Number of merged decks.
    pub fn deck_count(&self) -> usize {
        self.deck_count
    }

    /// Cards in the room: 52 per deck.
    pub fn total(&self) -> usize {
        CARDS_PER_DECK * self.deck_count
    }
}
