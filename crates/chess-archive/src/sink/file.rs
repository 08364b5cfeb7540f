//! File-store sink.

use super::Sink;
use crate::Result;
use async_trait::async_trait;
use chess_archive_core::{Game, GameFile, Transformer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata about one stored file artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    /// Flat game fields attached at creation time.
    pub metadata: BTreeMap<String, String>,
}

/// An append-only store of named files grouped in folders.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create a new file in `folder`. Never overwrites; returns the file ID.
    async fn create(
        &self,
        folder: &str,
        file: &GameFile,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String>;

    /// The file in `folder` holding the most recently played game, if any.
    ///
    /// Ordered by the `played_at` field of the metadata, not by creation
    /// time: one run creates its files concurrently and in no fixed order.
    async fn newest_in_folder(&self, folder: &str) -> Result<Option<StoredFile>>;
}

/// Sink writing each game as a PGN file artifact.
///
/// Not idempotent: the backing store is append-only, so writing the same game
/// twice yields two files. Correctness depends on the watermark never
/// rewinding.
#[derive(Clone)]
pub struct FileSink {
    store: Arc<dyn FileStore>,
    folder: String,
    transformer: Arc<Transformer>,
}

impl FileSink {
    pub fn new(
        store: Arc<dyn FileStore>,
        folder: impl Into<String>,
        transformer: Arc<Transformer>,
    ) -> Self {
        Self {
            store,
            folder: folder.into(),
            transformer,
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn put(&self, game: &Game) -> Result<String> {
        let file = self.transformer.to_file(game);
        let metadata = self.transformer.to_field_map(game);

        tracing::debug!(game_id = %game.id, name = %file.name, "file sink put");

        self.store.create(&self.folder, &file, &metadata).await
    }
}
