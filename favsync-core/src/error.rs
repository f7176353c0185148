//! Error types for favsync-core.

use thiserror::Error;

/// A timestamp, tool document, or escaped string could not be interpreted.
///
/// Fatal for the single record being translated; never shared across records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No accepted timestamp format matched.
    #[error("cannot parse timestamp '{value}'")]
    Timestamp { value: String },

    /// The external tool's structured document had an unexpected shape.
    #[error("malformed tool document: {reason}")]
    Document { reason: String },

    /// An escaped description contained an invalid escape sequence.
    #[error("invalid escape at byte {position}: {reason}")]
    Escape { position: usize, reason: String },
}
