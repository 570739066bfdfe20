//! Core deterministic primitives.
//!
//! Card values and the seeded RNG used for shuffling. Nothing in here
//! touches the network or the clock.

pub mod card;
pub mod rng;

// Re-export core types
pub use card::{Card, Rank, Suit, WireCard};
pub use rng::{DeterministicRng, derive_room_seed};
