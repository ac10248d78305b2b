//! Web-profile video transcoding using ffmpeg, with progress reporting.

use std::path::Path;

use tl_core::config::VideoConfig;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Progress stats from an ffmpeg encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Encoder completion, 0.0..=100.0.
    pub percent: f64,
    pub fps: Option<f64>,
    pub speed: Option<String>,
}

/// Incremental parser for ffmpeg `-progress` output.
///
/// ffmpeg emits blocks of `key=value` lines terminated by
/// `progress=continue` or `progress=end`; one [`EncodeProgress`] is produced
/// per block.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration_secs: f64,
    out_time_us: Option<i64>,
    fps: Option<f64>,
    speed: Option<String>,
}

impl ProgressParser {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            out_time_us: None,
            fps: None,
            speed: None,
        }
    }

    /// Feed one line; returns a progress sample at the end of each block.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let (key, value) = line.split_once('=')?;
        let value = value.trim();
        match key.trim() {
            // Both keys carry microseconds despite the name of the second.
            "out_time_us" | "out_time_ms" => self.out_time_us = value.parse().ok(),
            "fps" => self.fps = value.parse().ok(),
            "speed" if value != "N/A" => self.speed = Some(value.to_string()),
            "progress" => {
                let percent = if value == "end" {
                    100.0
                } else {
                    let out_us = self.out_time_us?;
                    if self.duration_secs <= 0.0 {
                        return None;
                    }
                    let elapsed = out_us as f64 / 1_000_000.0;
                    (elapsed / self.duration_secs * 100.0).clamp(0.0, 100.0)
                };
                return Some(EncodeProgress {
                    percent,
                    fps: self.fps,
                    speed: self.speed.clone(),
                });
            }
            _ => {}
        }
        None
    }
}

/// ffmpeg arguments for the fixed web profile: re-encode to the configured
/// codec and bitrate, scale down to the configured width, AAC audio when the
/// source has any, and `+faststart` for progressive playback.
pub fn transcode_args(input: &Path, output: &Path, config: &VideoConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:2".into(),
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "0:a:0?".into(),
        "-c:v".into(),
        config.codec.clone(),
        "-preset".into(),
        config.preset.clone(),
        "-b:v".into(),
        config.video_bitrate.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-vf".into(),
        format!("scale='min({},iw)':-2", config.width),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        config.audio_bitrate.clone(),
    ];
    if config.container == "mp4" || config.container == "mov" {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args.push(output.to_string_lossy().to_string());
    args
}

/// Transcode `input` into `output`, streaming progress to `on_progress`.
///
/// `duration_secs` is the probed source duration used to compute the
/// percentage. The encode is bounded by `config.encode_timeout_secs`.
pub async fn transcode_video(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    config: &VideoConfig,
    duration_secs: f64,
    mut on_progress: impl FnMut(EncodeProgress) + Send,
) -> tl_core::Result<()> {
    let ffmpeg = tools.require("ffmpeg")?;

    tracing::info!(
        "Video encode: {:?} -> {:?} (codec={}, bitrate={}, width={}, preset={})",
        input,
        output,
        config.codec,
        config.video_bitrate,
        config.width,
        config.preset,
    );

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(config.encode_timeout());
    cmd.args(transcode_args(input, output, config));

    let mut parser = ProgressParser::new(duration_secs);
    cmd.execute_with_stderr_callback(|line| {
        if let Some(progress) = parser.feed(line) {
            on_progress(progress);
        }
    })
    .await?;

    Ok(())
}
