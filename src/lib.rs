//! # Cardroom
//!
//! Host-authoritative synchronization core for turn-based, multi-deck card rooms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CARDROOM                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  ├── card.rs       - Suit / rank / card values               │
//! │  └── rng.rs        - Seeded Xorshift128+ and shuffling       │
//! │                                                              │
//! │  game/             - Room rules state (no I/O)               │
//! │  ├── settings.rs   - Room configuration                      │
//! │  ├── turn.rs       - Seat registry and turn cursor           │
//! │  ├── deck.rs       - Multi-deck draw pile and discards       │
//! │  └── hand.rs       - Cards held by one player                │
//! │                                                              │
//! │  network/          - Protocol, transport and dispatch        │
//! │  ├── protocol.rs   - Typed messages and wire codec           │
//! │  ├── framing.rs    - Length-delimited frames                 │
//! │  ├── transport.rs  - Transport trait and events              │
//! │  ├── connection.rs - Active connection set and polling       │
//! │  ├── memory.rs     - In-process relay transport              │
//! │  ├── tcp.rs        - Non-blocking TCP transport              │
//! │  ├── session.rs    - Authoritative room session              │
//! │  ├── host.rs       - Host dispatcher                         │
//! │  └── peer.rs       - Peer dispatcher (mirror)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Only the host mutates shared state (draw pile, hands, turn cursor).
//! Peers hold a mirror derived from host broadcasts and forward user
//! requests, which the host re-validates before applying.
//!
//! Both sides are driven by a single cooperative `tick()` per scheduler
//! step; nothing in the core blocks or spawns threads.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::card::{Card, Rank, Suit};
pub use crate::core::rng::DeterministicRng;
pub use crate::game::deck::DeckPool;
pub use crate::game::hand::Hand;
pub use crate::game::settings::RoomSettings;
pub use crate::game::turn::TurnManager;
pub use crate::network::host::HostDispatcher;
pub use crate::network::peer::PeerDispatcher;
pub use crate::network::protocol::{CodecError, Message};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cards in one standard deck.
pub const CARDS_PER_DECK: usize = 52;
