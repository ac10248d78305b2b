//! Unified error type for the travelog media service.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].
//! Cleanup failures are never represented here; they are logged where they
//! happen and do not change the outcome of an operation.

use std::fmt;

/// Unified error type covering all failure modes in travelog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found (unknown or expired job).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation (missing file, malformed id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The declared MIME type is not accepted for this kind of upload.
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// The upload exceeds the configured size limit.
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Size of the rejected upload.
        size: u64,
        /// Configured limit for this kind of upload.
        limit: u64,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Decoding or encoding a media file failed.
    #[error("Processing error [{kind}]: {message}")]
    Processing {
        /// The kind of media being processed (image, avatar, video).
        kind: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::UnsupportedMedia(_) => 415,
            Error::TooLarge { .. } => 413,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Processing { .. } => 422,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error rejects the input before any work started.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::UnsupportedMedia(_) | Error::TooLarge { .. }
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Processing`].
    pub fn processing(kind: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Processing {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
