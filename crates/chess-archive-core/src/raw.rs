//! Raw provider records.
//!
//! Sources hand the pipeline [`RawGame`] values: a tagged union over every
//! provider format the transformer knows, plus an `Unsupported` arm carrying
//! records tagged with a provider nothing can decode yet.

use crate::{Error, LICHESS_KIND, Result};
use serde::{Deserialize, Serialize};

/// A game record as delivered by a remote source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGame {
    /// A game from the Lichess export API.
    Lichess(LichessGame),

    /// A record tagged with an unknown provider kind.
    Unsupported {
        kind: String,
        payload: serde_json::Value,
    },
}

impl RawGame {
    /// Decode one NDJSON line produced by the provider identified by `kind`.
    ///
    /// A blank line or a JSON `null` is a nil record. Lines from unknown
    /// providers are kept verbatim so the transformer can reject them.
    pub fn decode(kind: &str, line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() || line == "null" {
            return Err(Error::NilRecord);
        }

        match kind {
            LICHESS_KIND => Ok(Self::Lichess(serde_json::from_str(line)?)),
            other => Ok(Self::Unsupported {
                kind: other.to_string(),
                payload: serde_json::from_str(line)?,
            }),
        }
    }

    /// Provider kind tag of this record.
    pub fn kind(&self) -> &str {
        match self {
            Self::Lichess(_) => LICHESS_KIND,
            Self::Unsupported { kind, .. } => kind,
        }
    }
}

// ============================================================================
// Lichess export format
// ============================================================================

/// A game as returned by `GET /api/games/user/{username}` (NDJSON).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LichessGame {
    pub id: String,
    pub rated: bool,
    pub variant: String,
    pub speed: String,
    /// Creation time in Unix milliseconds.
    pub created_at: i64,
    pub last_move_at: Option<i64>,
    pub status: String,
    pub players: LichessPlayers,
    pub winner: Option<String>,
    pub opening: Option<LichessOpening>,
    pub moves: String,
    /// Present when requested with `pgnInJson=true`.
    pub pgn: Option<String>,
    pub clock: Option<LichessClock>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessPlayers {
    pub white: LichessPlayer,
    pub black: LichessPlayer,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LichessPlayer {
    /// Absent for anonymous players and engine opponents.
    pub user: Option<LichessUser>,
    pub rating: Option<u32>,
    pub rating_diff: Option<i32>,
    /// Set instead of `user` when the opponent is the Lichess AI.
    pub ai_level: Option<u8>,
    pub analysis: Option<LichessAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessUser {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessAnalysis {
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
    pub acpl: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessOpening {
    pub eco: String,
    pub name: String,
    pub ply: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LichessClock {
    /// Initial time in seconds.
    pub initial: u32,
    /// Increment per move in seconds.
    pub increment: u32,
    pub total_time: u32,
}
