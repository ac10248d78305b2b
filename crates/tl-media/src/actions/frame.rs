//! Single still-frame extraction using ffmpeg.

use std::path::Path;
use std::time::Duration;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Representative cover timestamp: the midpoint, clamped to `[0, duration]`.
pub fn cover_timestamp(duration_secs: f64) -> f64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0.0;
    }
    (duration_secs / 2.0).clamp(0.0, duration_secs)
}

/// Thumbnail timestamp: `preferred_secs` in, or the start for clips shorter
/// than that.
pub fn thumbnail_timestamp(preferred_secs: f64, duration_secs: f64) -> f64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 || preferred_secs < 0.0 {
        return 0.0;
    }
    if preferred_secs >= duration_secs {
        0.0
    } else {
        preferred_secs
    }
}

/// ffmpeg arguments for grabbing one frame at `at_secs`, scaled to at most
/// `width` pixels wide with the height kept even.
pub fn frame_args(input: &Path, output: &Path, at_secs: f64, width: u32) -> Vec<String> {
    vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-ss".into(),
        format!("{at_secs:.3}"),
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        format!("scale='min({width},iw)':-2"),
        "-q:v".into(),
        "2".into(),
        output.to_string_lossy().to_string(),
    ]
}

/// Extract a single JPEG frame from `input` at `at_secs` into `output`.
///
/// ffmpeg exits successfully without writing anything when the seek lands
/// past the last frame, so an empty or missing output is treated as a
/// processing error.
pub async fn extract_frame(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    at_secs: f64,
    width: u32,
    timeout: Duration,
) -> tl_core::Result<()> {
    let ffmpeg = tools.require("ffmpeg")?;

    tracing::debug!(
        "Extracting frame at {at_secs:.3}s: {:?} -> {:?} (width={width})",
        input,
        output
    );

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(timeout);
    cmd.args(frame_args(input, output, at_secs, width));
    cmd.execute().await?;

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(tl_core::Error::processing(
            "video",
            format!("no frame could be extracted at {at_secs:.3}s"),
        )),
    }
}
