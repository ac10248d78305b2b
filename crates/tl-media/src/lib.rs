//! # tl-media
//!
//! Media processing and external tool management for travelog uploads.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and line-by-line stderr streaming.
//! - **Probing** ([`probe`]) -- source duration and dimensions via ffprobe.
//! - **Actions** ([`actions`]) -- still-frame extraction and web-profile
//!   transcoding with progress parsing.
//! - **Backend seam** ([`VideoBackend`], [`FfmpegBackend`]) -- what the video
//!   pipeline calls, so the encoder can be swapped.
//! - **Image transcoding** ([`imaging`]) -- WebP recompression for images and
//!   avatars.
//! - **File guards** ([`StagedUpload`], [`WorkingCopy`]) -- cleanup of staged
//!   uploads and per-job working copies.

pub mod actions;
pub mod backend;
pub mod command;
pub mod imaging;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use backend::{FfmpegBackend, VideoBackend};
pub use command::{ToolCommand, ToolOutput};
pub use imaging::{transcode_avatar, transcode_image};
pub use probe::{probe_video, VideoProbe};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{remove_best_effort, StagedUpload, WorkingCopy};

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
