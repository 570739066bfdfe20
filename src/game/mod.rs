//! Room Rules State
//!
//! Everything the host owns and mutates while a room is open. No I/O here;
//! dispatchers in `network/` translate messages into these calls.
//!
//! ## Module Structure
//!
//! - `settings`: Room configuration fixed at creation
//! - `turn`: Seat registry and turn cursor
//! - `deck`: Draw pile and discard pile over N merged decks
//! - `hand`: Cards held by a single player

pub mod settings;
pub mod turn;
pub mod deck;
pub mod hand;

// Re-export key types
pub use settings::{RoomSettings, SettingsError, validate_username};
pub use turn::{TurnManager, TurnError};
pub use deck::DeckPool;
pub use hand::Hand;
