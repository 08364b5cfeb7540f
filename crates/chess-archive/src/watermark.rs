//! Watermark resolution.
//!
//! The watermark is the `played_at` of the newest game already archived in
//! one designated sink. The next fetch lists only games played strictly after
//! it. An empty store is the first-run state and yields `None`; store errors
//! are surfaced as [`Error::Watermark`] so the run aborts before fetching.
//!
//! Because the watermark is derived from what a sink already holds, that sink
//! must only ever hold a gap-free prefix of the fetched games. The archiver
//! writes it last, in play order, after every other sink has finished the
//! batch (see [`WatermarkResolver::backing_sink`]).

use crate::sink::{DocumentStore, FileStore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Position of the newest archived game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub game_id: String,
    /// Unix milliseconds.
    pub played_at: i64,
}

/// Resolves the watermark from one authoritative store.
#[async_trait]
pub trait WatermarkResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Name of the [`Sink`](crate::sink::Sink) whose writes move this
    /// watermark, if that sink takes part in the run.
    fn backing_sink(&self) -> Option<&'static str> {
        None
    }

    /// Newest archived game, or `None` when nothing has been archived yet.
    async fn last_known(&self) -> Result<Option<Watermark>>;
}

/// Watermark read from the document store.
pub struct DocumentWatermark {
    store: Arc<dyn DocumentStore>,
}

impl DocumentWatermark {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WatermarkResolver for DocumentWatermark {
    fn name(&self) -> &'static str {
        "document"
    }

    fn backing_sink(&self) -> Option<&'static str> {
        Some("document")
    }

    async fn last_known(&self) -> Result<Option<Watermark>> {
        let latest = self
            .store
            .latest()
            .await
            .map_err(|e| Error::watermark(self.name(), e))?;

        Ok(latest.map(|game| Watermark {
            game_id: game.id,
            played_at: game.played_at,
        }))
    }
}

/// Watermark read from the newest file in the archive folder.
///
/// `played_at` comes from the file's metadata, never from its creation time:
/// files are created at archive time, not play time.
pub struct FileWatermark {
    store: Arc<dyn FileStore>,
    folder: String,
}

impl FileWatermark {
    pub fn new(store: Arc<dyn FileStore>, folder: impl Into<String>) -> Self {
        Self {
            store,
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl WatermarkResolver for FileWatermark {
    fn name(&self) -> &'static str {
        "file"
    }

    fn backing_sink(&self) -> Option<&'static str> {
        Some("file")
    }

    async fn last_known(&self) -> Result<Option<Watermark>> {
        let newest = self
            .store
            .newest_in_folder(&self.folder)
            .await
            .map_err(|e| Error::watermark(self.name(), e))?;

        let Some(file) = newest else {
            return Ok(None);
        };

        let played_at = file
            .metadata
            .get("played_at")
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                Error::watermark(
                    self.name(),
                    Error::Corrupt(format!("file {} has no played_at metadata", file.id)),
                )
            })?;

        let game_id = file.metadata.get("id").cloned().unwrap_or(file.id);

        Ok(Some(Watermark { game_id, played_at }))
    }
}
