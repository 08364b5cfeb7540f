//! Error types for the chess archive core.

use thiserror::Error;

use crate::game::Side;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or transforming source records.
#[derive(Error, Debug)]
pub enum Error {
    /// The raw record carries a provider tag no transformer understands.
    #[error("unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// The raw record is empty or missing its identity.
    #[error("nil record: source returned an empty game")]
    NilRecord,

    /// Neither a user name nor an AI level was present for one side.
    #[error("cannot resolve {0} player name")]
    MissingPlayerName(Side),

    /// A field holds a value that cannot be represented canonically.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// The name of the invalid field.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
