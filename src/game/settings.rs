//! Room Settings
//!
//! Configuration chosen by the host when a room is opened. Immutable for the
//! lifetime of the room.

use thiserror::Error;

/// Smallest room (host + one peer).
pub const MIN_PLAYERS: usize = 2;
/// Largest room.
pub const MAX_PLAYERS: usize = 10;
/// Most decks that can be merged into one pile.
pub const MAX_DECKS: usize = 10;
/// Most cards dealt to each hand.
pub const MAX_CARDS_PER_HAND: usize = 8;
/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 12;

/// Room configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Display name; empty means "<host>'s Room".
    pub room_name: String,
    /// Seats including the host (2-10).
    pub max_players: usize,
    /// Standard decks merged into the draw pile (1-10).
    pub deck_count: usize,
    /// Declared joker count. Not added to the decks.
    pub jokers_count: usize,
    /// Cards dealt to every seat at game start (1-8).
    pub cards_per_hand: usize,
    /// `true` rotates toward lower positions, `false` toward higher ones.
    pub clockwise: bool,
    /// Per-player turn timeout in seconds. Not enforced.
    pub player_timeout_secs: u32,
    /// Fixed shuffle seed; `None` draws fresh entropy per game.
    pub seed: Option<u64>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            room_name: String::new(),
            max_players: 4,
            deck_count: 1,
            jokers_count: 8,
            cards_per_hand: 5,
            clockwise: true,
            player_timeout_secs: 30,
            seed: None,
        }
    }
}

impl RoomSettings {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(SettingsError::MaxPlayers(self.max_players));
        }
        if !(1..=MAX_DECKS).contains(&self.deck_count) {
            return Err(SettingsError::DeckCount(self.deck_count));
        }
        if self.jokers_count == 0 {
            return Err(SettingsError::JokersCount);
        }
        if !(1..=MAX_CARDS_PER_HAND).contains(&self.cards_per_hand) {
            return Err(SettingsError::CardsPerHand(self.cards_per_hand));
        }
        Ok(())
    }

    /// Connections the relay must allocate (every seat but the host's).
    pub fn max_connections(&self) -> usize {
        self.max_players.saturating_sub(1)
    }

    /// Room display name for a given host.
    pub fn display_name(&self, host: &str) -> String {
        if self.room_name.is_empty() {
            format!("{}'s Room", host)
        } else {
            self.room_name.clone()
        }
    }

    /// Load settings from `CARDROOM_*` environment variables.
    ///
    /// Unset variables keep their default; the result is validated.
    pub fn from_env() -> Result<Self, SettingsError> {
        let defaults = Self::default();
        let settings = Self {
            room_name: std::env::var("CARDROOM_ROOM_NAME").unwrap_or(defaults.room_name),
            max_players: env_number("CARDROOM_MAX_PLAYERS", defaults.max_players)?,
            deck_count: env_number("CARDROOM_DECKS", defaults.deck_count)?,
            jokers_count: env_number("CARDROOM_JOKERS", defaults.jokers_count)?,
            cards_per_hand: env_number("CARDROOM_CARDS_PER_HAND", defaults.cards_per_hand)?,
            clockwise: std::env::var("CARDROOM_CLOCKWISE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.clockwise),
            player_timeout_secs: env_number("CARDROOM_PLAYER_TIMEOUT", defaults.player_timeout_secs)?,
            seed: match std::env::var("CARDROOM_SEED") {
                Ok(v) => Some(v.parse().map_err(|_| SettingsError::InvalidValue {
                    var: "CARDROOM_SEED",
                    value: v,
                })?),
                Err(_) => None,
            },
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn env_number<N: std::str::FromStr>(var: &'static str, default: N) -> Result<N, SettingsError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

/// Check a username: 1-12 characters of letters, digits, `_`, `@` or `#`.
pub fn validate_username(name: &str) -> Result<(), SettingsError> {
    if name.is_empty() || name.chars().count() > MAX_USERNAME_LEN {
        return Err(SettingsError::UsernameLength(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#'))
    {
        return Err(SettingsError::UsernameCharacters(name.to_string()));
    }
    Ok(())
}

/// Settings validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Player count out of range.
    #[error("max players must be between 2 and 10, got {0}")]
    MaxPlayers(usize),

    /// Deck count out of range.
    #[error("deck count must be between 1 and 10, got {0}")]
    DeckCount(usize),

    /// Jokers must be declared.
    #[error("jokers count must be more than 0")]
    JokersCount,

    /// Hand size out of range.
    #[error("cards per hand must be between 1 and 8, got {0}")]
    CardsPerHand(usize),

    /// Username empty or too long.
    #[error("username '{0}' must be between 1 and 12 characters")]
    UsernameLength(String),

    /// Username contains disallowed characters.
    #[error("username '{0}' may only contain letters, numbers, '@', '_' and '#'")]
    UsernameCharacters(String),

    /// Environment variable could not be parsed.
    #[error("invalid value '{value}' for {var}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let settings = RoomSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.clockwise);
        assert_eq!(settings.max_connections(), 3);
    }

    #[test]
    fn test_ranges() {
        let bad_players = RoomSettings { max_players: 11, ..Default::default() };
        assert_eq!(bad_players.validate(), Err(SettingsError::MaxPlayers(11)));

        let solo = RoomSettings { max_players: 1, ..Default::default() };
        assert_eq!(solo.validate(), Err(SettingsError::MaxPlayers(1)));

        let no_decks = RoomSettings { deck_count: 0, ..Default::default() };
        assert_eq!(no_decks.validate(), Err(SettingsError::DeckCount(0)));

        let big_hand = RoomSettings { cards_per_hand: 9, ..Default::default() };
        assert_eq!(big_hand.validate(), Err(SettingsError::CardsPerHand(9)));

        let no_jokers = RoomSettings { jokers_count: 0, ..Default::default() };
        assert_eq!(no_jokers.validate(), Err(SettingsError::JokersCount));

        let edge = RoomSettings {
            max_players: 10,
            deck_count: 10,
            cards_per_hand: 8,
            ..Default::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_display_name() {
        let settings = RoomSettings::default();
        assert_eq!(settings.display_name("maya"), "maya's Room");

        let named = RoomSettings { room_name: "Friday".into(), ..Default::default() };
        assert_eq!(named.display_name("maya"), "Friday");
    }

    #[test]
    fn test_usernames() {
        assert!(validate_username("player_1").is_ok());
        assert!(validate_username("a@b#c").is_ok());
        assert!(validate_username("abcdefghijkl").is_ok());
        assert!(matches!(validate_username(""), Err(SettingsError::UsernameLength(_))));
        assert!(matches!(validate_username("abcdefghijklm"), Err(SettingsError::UsernameLength(_))));
        assert!(matches!(validate_username("semi;colon"), Err(SettingsError::UsernameCharacters(_))));
        assert!(matches!(validate_username("has space"), Err(SettingsError::UsernameCharacters(_))));
    }
}
