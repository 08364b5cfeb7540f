//! Document-store sink.

use super::Sink;
use crate::Result;
use async_trait::async_trait;
use chess_archive_core::Game;
use std::sync::Arc;

/// A collection of games keyed by canonical game ID.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or overwrite the document for `game.id`. Returns the key.
    async fn upsert(&self, game: &Game) -> Result<String>;

    /// The stored game with the greatest `played_at`, if any.
    async fn latest(&self) -> Result<Option<Game>>;
}

/// Sink writing games into a [`DocumentStore`].
///
/// Re-running with the same game overwrites the existing document, so
/// replays never create duplicates.
#[derive(Clone)]
pub struct DocumentSink {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Sink for DocumentSink {
    fn name(&self) -> &'static str {
        "document"
    }

    async fn put(&self, game: &Game) -> Result<String> {
        tracing::debug!(game_id = %game.id, "document sink put");
        self.store.upsert(game).await
    }
}
