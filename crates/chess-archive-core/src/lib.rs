//! Core types and pure transformations for the chess archive.
//!
//! This crate provides:
//! - The canonical [`Game`] model every sink persists
//! - Raw provider records ([`RawGame`]) as a tagged union over known sources
//! - The [`Transformer`] mapping raw records into canonical games, plus the
//!   file and flat-map projections sinks need
//! - Prometheus metrics helpers
//! - Shared error types
//!
//! Nothing in this crate performs network or disk I/O (apart from the metrics
//! HTTP endpoint), so every transformation is deterministic and unit-testable.

mod error;
mod game;
pub mod metrics;
mod raw;
mod transform;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Format used when rendering `played_at` into artifact names.
pub const PLAYED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind tag for records coming from the Lichess export API.
pub const LICHESS_KIND: &str = "lichess";

pub use error::{Error, Result};
pub use game::{Analysis, Game, Opening, Player, Players, Side, SourceKind, UserResult, Winner};
pub use raw::{
    LichessAnalysis, LichessClock, LichessGame, LichessOpening, LichessPlayer, LichessPlayers,
    LichessUser, RawGame,
};
pub use transform::{GameFile, Transformer};
