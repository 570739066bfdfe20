//! Turn Order
//!
//! Seat registry plus the turn cursor. Positions are handed out in join
//! order, starting at 0 for the host, and are never freed or reused.
//!
//! The host owns the authoritative instance; each peer keeps a mirror that is
//! rebuilt from roster syncs and moved by `player-manager-current-start`.

use std::collections::BTreeMap;

use thiserror::Error;

/// Registered players and whose turn it is.
#[derive(Debug, Clone)]
pub struct TurnManager {
    /// Usernames indexed by position.
    seats: Vec<String>,
    /// Reverse lookup.
    positions: BTreeMap<String, usize>,
    /// Position currently holding the turn.
    cursor: usize,
    /// `true` walks the cursor downward.
    clockwise: bool,
}

impl Default for TurnManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TurnManager {
    /// Create an empty registry rotating in the given direction.
    pub fn new(clockwise: bool) -> Self {
        Self {
            seats: Vec::new(),
            positions: BTreeMap::new(),
            cursor: 0,
            clockwise,
        }
    }

    /// Register a player, returning their position.
    ///
    /// Re-registering an existing name returns the position it already has.
    pub fn add_player(&mut self, username: &str) -> usize {
        if let Some(&pos) = self.positions.get(username) {
            return pos;
        }
        let pos = self.seats.len();
        self.seats.push(username.to_string());
        self.positions.insert(username.to_string(), pos);
        pos
    }

    /// Set rotation direction.
    pub fn set_direction(&mut self, clockwise: bool) {
        self.clockwise = clockwise;
    }

    /// Rotation direction.
    pub fn clockwise(&self) -> bool {
        self.clockwise
    }

    /// Whether `username` holds the turn. Unknown names never do.
    pub fn is_turn(&self, username: &str) -> bool {
        self.positions.get(username) == Some(&self.cursor)
    }

    /// Advance the cursor one seat.
    pub fn next_turn(&mut self) {
        let count = self.seats.len();
        if count == 0 {
            return;
        }
        self.cursor = if self.clockwise {
            (self.cursor + count - 1) % count
        } else {
            (self.cursor + 1) % count
        };
    }

    /// Move the cursor to an explicit position.
    pub fn set_current(&mut self, position: usize) -> Result<(), TurnError> {
        if position >= self.seats.len() {
            return Err(TurnError::UnknownPosition(position));
        }
        self.cursor = position;
        Ok(())
    }

    /// Position holding the turn.
    pub fn current_position(&self) -> usize {
        self.cursor
    }

    /// Username holding the turn, if anyone is seated.
    pub fn current_player(&self) -> Option<&str> {
        self.seats.get(self.cursor).map(String::as_str)
    }

    /// Position of `username`, if registered.
    pub fn position(&self, username: &str) -> Option<usize> {
        self.positions.get(username).copied()
    }

    /// Position of `username`, failing for unregistered names.
    pub fn player_id(&self, username: &str) -> Result<usize, TurnError> {
        self.position(username)
            .ok_or_else(|| TurnError::UnknownPlayer(username.to_string()))
    }

    /// Username seated at `position`.
    pub fn player_at(&self, position: usize) -> Option<&str> {
        self.seats.get(position).map(String::as_str)
    }

    /// Number of registered players.
    pub fn count(&self) -> usize {
        self.seats.len()
    }

    /// Usernames in position order.
    pub fn players(&self) -> impl Iterator<Item = &str> {
        self.seats.iter().map(String::as_str)
    }
}

/// Turn registry lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// Username was never registered.
    #[error("unknown player '{0}'")]
    UnknownPlayer(String),

    /// No seat at this position.
    #[error("no player at position {0}")]
    UnknownPosition(usize),
}
