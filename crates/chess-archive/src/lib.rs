//! Incremental chess game archive.
//!
//! This crate syncs a player's finished games from a remote chess platform
//! into one or more durable sinks.
//!
//! # Modules
//!
//! - [`source`] - Remote game sources (Lichess export API) and request pacing
//! - [`sink`] - Sink capability with document-store and file-store variants
//! - [`watermark`] - Resolves where the next fetch starts
//! - [`archiver`] - Orchestrates one run: watermark, fetch, transform, fan-out
//! - [`trigger`] - HTTP endpoint for message-queue push deliveries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Watermark    │  newest archived game in the designated sink
//! └────────┬────────┘
//!          │ since (exclusive)
//!          ▼
//! ┌─────────────────┐
//! │   GameSource    │  Lichess NDJSON export, rate-limited
//! └────────┬────────┘
//!          │ raw records (oldest first, capped)
//!          ▼
//! ┌─────────────────┐
//! │   Transformer   │  canonical Game, file and field projections
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Sink fan-out   │  ClickHouse (upsert) + S3 (append-only)
//! └─────────────────┘
//! ```
//!
//! The archive only moves forward: the watermark store is the single source
//! of truth for progress, and nothing else is kept between runs.

pub mod app;
pub mod archiver;
pub mod config;
pub mod error;
pub mod sink;
pub mod source;
pub mod trigger;
pub mod watermark;

pub use archiver::{Archiver, ArchiverConfig, RunStats};
pub use config::{Config, SinkKind};
pub use error::{Error, Result};
pub use sink::{
    ClickHouseStore, DocumentSink, DocumentStore, FileSink, FileStore, MemoryDocumentStore,
    MemoryFileStore, S3Store, Sink, StoredFile,
};
pub use source::{GameSource, LichessClient, RateLimiter};
pub use watermark::{DocumentWatermark, FileWatermark, Watermark, WatermarkResolver};
