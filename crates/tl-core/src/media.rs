//! Media-domain enums: upload kinds and video job status.
//!
//! Both enums serialize in snake_case and implement `Display` manually for
//! consistent string representation in logs and API responses.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// MIME types accepted for image and avatar uploads.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// MIME types accepted for video uploads.
pub const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-msvideo",
];

/// The kind of upload, selecting which transcoder handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Avatar,
    Video,
}

impl MediaKind {
    /// MIME types this kind of upload accepts.
    pub fn accepted_mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::Image | Self::Avatar => IMAGE_MIME_TYPES,
            Self::Video => VIDEO_MIME_TYPES,
        }
    }

    /// Whether `mime` is accepted (case-insensitive, parameters ignored).
    pub fn accepts(&self, mime: &str) -> bool {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.accepted_mime_types().contains(&essence.as_str())
    }
}

/// MIME type for a file extension, limited to the formats uploads accept.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" | "m4v" => Some("video/mp4"),
        "mpg" | "mpeg" => Some("video/mpeg"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        _ => None,
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Avatar => write!(f, "avatar"),
            Self::Video => write!(f, "video"),
        }
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Stage of a video processing job.
///
/// Stages advance strictly in declaration order; `Error` may be reached from
/// any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Preparing,
    ExtractingCover,
    ProcessingVideo,
    GeneratingThumbnail,
    Completed,
    Error,
}

impl JobStatus {
    /// `Completed` and `Error` are terminal: no further mutation happens.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Position in the stage sequence. `Error` shares the highest rank so any
    /// stage may move to it.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Preparing => 0,
            Self::ExtractingCover => 1,
            Self::ProcessingVideo => 2,
            Self::GeneratingThumbnail => 3,
            Self::Completed | Self::Error => 4,
        }
    }

    /// Default human-readable message for the stage.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Preparing => "Preparing video",
            Self::ExtractingCover => "Extracting cover frame",
            Self::ProcessingVideo => "Transcoding video",
            Self::GeneratingThumbnail => "Generating thumbnail",
            Self::Completed => "Processing complete",
            Self::Error => "Processing failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => write!(f, "preparing"),
            Self::ExtractingCover => write!(f, "extracting_cover"),
            Self::ProcessingVideo => write!(f, "processing_video"),
            Self::GeneratingThumbnail => write!(f, "generating_thumbnail"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}
