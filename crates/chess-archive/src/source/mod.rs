//! Remote game sources.
//!
//! A source lists the tracked user's finished games played after a given
//! watermark. Sources are consumed as black boxes by the archiver: transport,
//! authentication and pacing all live behind the [`GameSource`] trait.
//!
//! # Available Sources
//!
//! - [`LichessClient`] - Lichess game export API (NDJSON)

mod lichess;
mod limiter;

pub use lichess::LichessClient;
pub use limiter::RateLimiter;

use crate::Result;
use async_trait::async_trait;
use chess_archive_core::RawGame;

/// A remote source of finished games.
///
/// # Boundary convention
///
/// `since` is **exclusive**: implementations return only games whose
/// `played_at` is strictly greater than `since` (Unix milliseconds). `0`
/// means "everything". Games are returned oldest first so that truncating a
/// batch keeps the watermark contiguous.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Human-readable name for this source (used in logs and errors).
    fn name(&self) -> &'static str;

    /// List at most `max` games of `username` played after `since`.
    async fn list_games(&self, username: &str, since: i64, max: usize) -> Result<Vec<RawGame>>;
}
