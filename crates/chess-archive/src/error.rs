//! Error types for the sync pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried across component boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during an archive run.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (startup only).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The designated sink could not report its newest game.
    #[error("watermark query against {store} failed: {source}")]
    Watermark {
        store: &'static str,
        #[source]
        source: BoxError,
    },

    /// The remote source failed to list games.
    #[error("listing games from {client} failed: {source}")]
    SourceFetch {
        client: &'static str,
        #[source]
        source: BoxError,
    },

    /// A fetched record could not be transformed.
    #[error("transforming record #{index} failed: {source}")]
    Transform {
        /// Position of the record in the fetched batch.
        index: usize,
        #[source]
        source: chess_archive_core::Error,
    },

    /// One (game, sink) fan-out unit failed.
    #[error("writing game {game_id} to {sink} sink failed: {source}")]
    SinkWrite {
        sink: &'static str,
        game_id: String,
        #[source]
        source: BoxError,
    },

    /// A fan-out task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(String),

    /// ClickHouse error.
    #[error("ClickHouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    /// S3 error.
    #[error("S3 error: {0}")]
    S3(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with a non-success status.
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data that cannot be read back into the canonical model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Core decoding / transformation error outside a batch.
    #[error(transparent)]
    Core(#[from] chess_archive_core::Error),
}

impl Error {
    /// Wrap a store error as a watermark failure.
    pub fn watermark(store: &'static str, err: Error) -> Self {
        Self::Watermark {
            store,
            source: Box::new(err),
        }
    }

    /// Wrap a client error as a source fetch failure.
    pub fn source_fetch(client: &'static str, err: Error) -> Self {
        Self::SourceFetch {
            client,
            source: Box::new(err),
        }
    }

    /// Wrap a sink error with the unit it belongs to.
    pub fn sink_write(sink: &'static str, game_id: impl Into<String>, err: Error) -> Self {
        Self::SinkWrite {
            sink,
            game_id: game_id.into(),
            source: Box::new(err),
        }
    }
}
