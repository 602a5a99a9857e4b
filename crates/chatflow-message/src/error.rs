//! Error types for the message model.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing message records or resolving media content.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The record's `type` tag does not name a known component.
    #[error("unknown message component type: {0}")]
    UnknownVariant(String),

    /// A required field is missing or has the wrong shape.
    #[error("invalid field in `{kind}` component: {reason}")]
    InvalidField {
        /// The component tag being parsed.
        kind: String,
        /// What was wrong with the record.
        reason: String,
    },

    /// Byte resolution was requested on a media component with no usable source.
    #[error("media component has no content source")]
    NoContentSource,

    /// Fetching a remote media URL failed.
    #[error("failed to fetch media from {url}: {reason}")]
    Fetch {
        /// The URL that was requested.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reading a local media file failed.
    #[error("failed to read media file {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Inline media bytes could not be decoded.
    #[error("invalid inline media payload: {0}")]
    Decode(String),
}

impl MessageError {
    /// Creates an invalid field error.
    pub fn invalid_field(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Creates a fetch error.
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for message operations.
pub type MessageResult<T> = Result<T, MessageError>;
