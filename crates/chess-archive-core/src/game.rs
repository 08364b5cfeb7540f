//! Canonical game model.
//!
//! A [`Game`] is built once per run by the [`Transformer`](crate::Transformer),
//! handed by reference to every sink and never mutated afterwards. Durability
//! lives entirely in the sinks; nothing here is retained across runs.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider a game was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lichess,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lichess => "lichess",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the game from the tracked user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserResult {
    Win,
    Lose,
    Draw,
}

impl UserResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Draw => "draw",
        }
    }
}

impl fmt::Display for UserResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// Declared winner of the game.
///
/// Serialized as `"white"`, `"black"` or `""` (draw / no winner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "white")]
    White,
    #[serde(rename = "black")]
    Black,
    #[default]
    #[serde(rename = "")]
    None,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::None => "",
        }
    }

    /// Parse the stored string form; anything unrecognized means no winner.
    pub fn from_label(label: &str) -> Self {
        match label {
            "white" => Self::White,
            "black" => Self::Black,
            _ => Self::None,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Self::White => Some(Side::White),
            Self::Black => Some(Side::Black),
            Self::None => None,
        }
    }
}

/// Post-game engine analysis for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Analysis {
    pub inaccuracy: u16,
    pub mistake: u16,
    pub blunder: u16,
    /// Average centipawn loss.
    pub acpl: u16,
}

/// Opening metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opening {
    pub name: String,
    /// ECO classification code (e.g., "B01").
    pub eco: String,
}

/// One participant of a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Provider player ID (empty for engine opponents).
    pub id: String,
    pub name: String,
    pub rating: u16,
    /// Present only when the provider ran post-game analysis.
    pub analysis: Option<Analysis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Players {
    pub white: Player,
    pub black: Player,
}

impl Players {
    pub fn get(&self, side: Side) -> &Player {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

/// The normalized, source-agnostic game record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Game {
    /// Source-qualified unique ID, e.g. `lichess:q7ZvsdUF`.
    pub id: String,
    pub source: SourceKind,
    /// Speed or variant label (e.g., "blitz", "chess960").
    pub speed: String,
    /// Elapsed game time in seconds.
    pub duration: u32,
    /// Provider termination status (e.g., "mate", "resign", "outoftime").
    pub status: String,
    pub user_result: UserResult,
    /// Unix timestamp in milliseconds. Authoritative for ordering.
    pub played_at: i64,
    pub winner: Winner,
    /// Full move text.
    pub pgn: String,
    pub opening: Option<Opening>,
    pub players: Players,
}

impl Game {
    /// Build the source-qualified ID for a provider game ID.
    pub fn qualified_id(source: SourceKind, provider_id: &str) -> String {
        format!("{}:{}", source, provider_id)
    }

    /// Game score in PGN notation.
    pub fn score(&self) -> &'static str {
        match self.winner {
            Winner::White => "1-0",
            Winner::Black => "0-1",
            Winner::None => "1/2-1/2",
        }
    }

    /// `played_at` rendered in the given offset.
    ///
    /// Falls back to the Unix epoch for timestamps chrono cannot represent.
    pub fn played_at_time(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        DateTime::from_timestamp_millis(self.played_at)
            .unwrap_or_default()
            .with_timezone(&offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> Player {
        Player {
            id: name.to_lowercase(),
            name: name.to_string(),
            rating: 1500,
            analysis: None,
        }
    }

    fn game(winner: Winner) -> Game {
        Game {
            id: Game::qualified_id(SourceKind::Lichess, "abcd1234"),
            source: SourceKind::Lichess,
            speed: "blitz".to_string(),
            duration: 300,
            status: "mate".to_string(),
            user_result: UserResult::Win,
            played_at: 1_514_505_150_384,
            winner,
            pgn: "1. e4 e5".to_string(),
            opening: None,
            players: Players {
                white: player("Alice"),
                black: player("Bob"),
            },
        }
    }

    #[test]
    fn test_qualified_id() {
        assert_eq!(
            Game::qualified_id(SourceKind::Lichess, "q7ZvsdUF"),
            "lichess:q7ZvsdUF"
        );
    }

    #[test]
    fn test_score() {
        assert_eq!(game(Winner::White).score(), "1-0");
        assert_eq!(game(Winner::Black).score(), "0-1");
        assert_eq!(game(Winner::None).score(), "1/2-1/2");
    }

    #[test]
    fn test_played_at_time_offset() {
        let utc = game(Winner::None).played_at_time(FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc.format("%Y-%m-%d %H:%M:%S").to_string(), "2017-12-28 23:52:30");

        let plus_two = game(Winner::None).played_at_time(FixedOffset::east_opt(7200).unwrap());
        assert_eq!(plus_two.format("%d %H:%M").to_string(), "29 01:52");
    }

    #[test]
    fn test_winner_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Winner::White).unwrap(), "\"white\"");
        assert_eq!(serde_json::to_string(&Winner::None).unwrap(), "\"\"");
        let parsed: Winner = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, Winner::None);
    }

    #[test]
    fn test_winner_from_label() {
        assert_eq!(Winner::from_label("black"), Winner::Black);
        assert_eq!(Winner::from_label(""), Winner::None);
        assert_eq!(Winner::from_label("???"), Winner::None);
        assert_eq!(Winner::White.side(), Some(Side::White));
        assert_eq!(Winner::None.side(), None);
    }

    #[test]
    fn test_game_serde_shape() {
        let value = serde_json::to_value(game(Winner::Black)).unwrap();
        assert_eq!(value["source"], "lichess");
        assert_eq!(value["user_result"], "win");
        assert_eq!(value["winner"], "black");
        assert!(value["opening"].is_null());
        assert_eq!(value["players"]["white"]["name"], "Alice");
    }
}
