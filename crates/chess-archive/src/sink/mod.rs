//! Storage sinks.
//!
//! A [`Sink`] persists one canonical game. Each variant is an independent
//! failure domain backed by a black-box store:
//!
//! - [`DocumentSink`] - upserts by game ID into a [`DocumentStore`] (idempotent)
//! - [`FileSink`] - creates a PGN artifact in a [`FileStore`] folder (append-only)
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────┐     ┌─────────────────┐
//!          ┌──▶│ DocumentSink │────▶│ ClickHouseStore │
//! Archiver │   └──────────────┘     └─────────────────┘
//!  fan-out │   ┌──────────────┐     ┌─────────────────┐
//!          └──▶│   FileSink   │────▶│     S3Store     │
//!              └──────────────┘     └─────────────────┘
//! ```
//!
//! Sinks never retry: any store error goes straight back to the archiver.

mod clickhouse_store;
mod document;
mod file;
mod memory;
mod s3;

pub use clickhouse_store::{ClickHouseStore, GameRow};
pub use document::{DocumentSink, DocumentStore};
pub use file::{FileSink, FileStore, StoredFile};
pub use memory::{MemoryDocumentStore, MemoryFile, MemoryFileStore};
pub use s3::S3Store;

use crate::Result;
use async_trait::async_trait;
use chess_archive_core::Game;

/// A durable destination for canonical games.
///
/// Implementations must be safe to call concurrently from many fan-out units.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sink identity used in logs, metrics and error context.
    fn name(&self) -> &'static str;

    /// Persist one game. Returns the store-side identifier of the write.
    async fn put(&self, game: &Game) -> Result<String>;
}
