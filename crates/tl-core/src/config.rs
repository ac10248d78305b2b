//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, upload storage, transcoding and job tracking.
//! Every section defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub uploads: UploadsConfig,
    pub images: ImageConfig,
    pub avatar: AvatarConfig,
    pub video: VideoConfig,
    pub jobs: JobsConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: read errors and parse errors are returned.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.images.quality == 0 || self.images.quality > 100 {
            warnings.push(format!(
                "images.quality {} is outside 1..=100 and will be clamped",
                self.images.quality
            ));
        }
        if self.avatar.quality == 0 || self.avatar.quality > 100 {
            warnings.push(format!(
                "avatar.quality {} is outside 1..=100 and will be clamped",
                self.avatar.quality
            ));
        }
        if self.images.max_width == 0 {
            warnings.push("images.max_width is 0; images cannot be resized to zero width".into());
        }

        if self.avatar.max_file_bytes > self.uploads.max_file_bytes {
            warnings.push(
                "avatar.max_file_bytes exceeds uploads.max_file_bytes; the request body limit wins"
                    .into(),
            );
        }

        if self.jobs.max_concurrent_transcodes == 0 {
            warnings.push(
                "jobs.max_concurrent_transcodes is 0; treating it as 1 so jobs can make progress"
                    .into(),
            );
        }

        if self.jobs.stale_after_secs < self.video.encode_timeout_secs {
            warnings.push(
                "jobs.stale_after_secs is shorter than video.encode_timeout_secs; \
                 long encodes may be swept while still running"
                    .into(),
            );
        }

        if !["mp4", "mov", "mkv"].contains(&self.video.container.as_str()) {
            warnings.push(format!(
                "video.container '{}' is not a recognized container (valid: mp4, mov, mkv)",
                self.video.container
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Upload storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Root directory; every artifact directory lives underneath it.
    pub root: PathBuf,
    /// Size limit for image and video uploads.
    pub max_file_bytes: u64,
    /// Maximum number of files in one multi-image upload.
    pub max_images_per_request: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            max_file_bytes: 100 * 1024 * 1024,
            max_images_per_request: 10,
        }
    }
}

impl UploadsConfig {
    /// Directory layout derived from [`UploadsConfig::root`].
    pub fn layout(&self) -> UploadLayout {
        UploadLayout::new(&self.root)
    }
}

/// Image recompression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub max_width: u32,
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            quality: 70,
        }
    }
}

/// Avatar settings: fixed square canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub size: u32,
    pub quality: u8,
    pub max_file_bytes: u64,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            size: 200,
            quality: 80,
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Video transcoding profile and still-frame settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub codec: String,
    pub preset: String,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    /// Maximum output width; narrower sources keep their width.
    pub width: u32,
    /// Container format and file extension of the transcoded video.
    pub container: String,
    pub cover_width: u32,
    pub thumbnail_width: u32,
    pub thumbnail_at_secs: f64,
    pub encode_timeout_secs: u64,
    pub frame_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "medium".into(),
            video_bitrate: "1000k".into(),
            audio_bitrate: "128k".into(),
            width: 720,
            container: "mp4".into(),
            cover_width: 720,
            thumbnail_width: 320,
            thumbnail_at_secs: 1.0,
            encode_timeout_secs: 3600,
            frame_timeout_secs: 60,
        }
    }
}

impl VideoConfig {
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs)
    }
}

/// Progress-tracking and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// How long terminal jobs stay queryable.
    pub retention_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
    /// Age after which a job that never finished is dropped.
    pub stale_after_secs: u64,
    pub max_concurrent_transcodes: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 30 * 60,
            sweep_interval_secs: 60,
            stale_after_secs: 6 * 60 * 60,
            max_concurrent_transcodes: 2,
        }
    }
}

impl JobsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// UploadLayout
// ---------------------------------------------------------------------------

/// Artifact directories under the upload root.
///
/// URLs handed to clients are relative to [`UploadLayout::root`], e.g.
/// `videos/<name>.mp4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLayout {
    pub root: PathBuf,
    pub images: PathBuf,
    pub videos: PathBuf,
    pub avatars: PathBuf,
    pub covers: PathBuf,
    pub thumbnails: PathBuf,
    pub temp: PathBuf,
}

impl UploadLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            images: root.join("images"),
            videos: root.join("videos"),
            avatars: root.join("avatars"),
            covers: root.join("covers"),
            thumbnails: root.join("thumbnails"),
            temp: root.join("temp"),
        }
    }

    /// Create every artifact directory if missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.images,
            &self.videos,
            &self.avatars,
            &self.covers,
            &self.thumbnails,
            &self.temp,
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                tracing::info!("Created upload directory {}", dir.display());
            }
        }
        Ok(())
    }
}
