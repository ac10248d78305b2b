//! Duration and dimension probing via `ffprobe`.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format
//! -show_streams` and keeps only what the video pipeline needs.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// What the pipeline needs to know about a source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub duration_secs: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Probe `input` with ffprobe.
///
/// # Errors
///
/// [`tl_core::Error::Tool`] when ffprobe is missing or rejects the file,
/// [`tl_core::Error::Probe`] when the output has no usable duration or no
/// video stream.
pub async fn probe_video(
    tools: &ToolRegistry,
    input: &Path,
    timeout: Duration,
) -> tl_core::Result<VideoProbe> {
    let ffprobe = tools.require("ffprobe")?;

    let mut cmd = ToolCommand::new(ffprobe.path.clone());
    cmd.timeout(timeout);
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(input.to_string_lossy().as_ref());

    let output = cmd.execute().await?;
    parse_ffprobe_json(&output.stdout)
}

/// Parse ffprobe's JSON report.
pub fn parse_ffprobe_json(json: &str) -> tl_core::Result<VideoProbe> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| tl_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| tl_core::Error::Probe("no video stream found".into()))?;

    // Container duration first, stream duration as fallback.
    let duration_secs = ff
        .format
        .and_then(|f| usable_duration(f.duration.as_deref()))
        .or_else(|| usable_duration(video.duration.as_deref()))
        .ok_or_else(|| tl_core::Error::Probe("source has no usable duration".into()))?;

    Ok(VideoProbe {
        duration_secs,
        width: video.width,
        height: video.height,
    })
}

/// A finite, positive duration in seconds; ffprobe reports `N/A` otherwise.
fn usable_duration(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}
