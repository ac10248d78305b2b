//! Video pipeline against real ffmpeg/ffprobe.
//!
//! Every test skips itself when the tools are not on PATH.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tl_core::config::{Config, ToolsConfig};
use tl_core::JobStatus;
use tl_media::{probe_video, FfmpegBackend, ToolRegistry};
use tl_server::context::AppContext;
use tl_server::orchestrator::UploadedFile;

fn tools() -> Option<Arc<ToolRegistry>> {
    let registry = ToolRegistry::discover(&ToolsConfig::default());
    if registry.is_available("ffmpeg") && registry.is_available("ffprobe") {
        Some(Arc::new(registry))
    } else {
        eprintln!("Skipping: ffmpeg/ffprobe not found");
        None
    }
}

/// Render a short synthetic clip with a test pattern and a tone.
fn make_clip(path: &Path, seconds: u32) -> bool {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(["-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={seconds}:size=1280x720:rate=15"))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={seconds}"))
        .args(["-shortest", "-c:v", "mpeg4", "-c:a", "aac"])
        .arg(path)
        .status();
    matches!(status, Ok(s) if s.success())
}

#[tokio::test]
async fn probe_reads_duration_and_size() {
    let Some(tools) = tools() else { return };
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    if !make_clip(&clip, 2) {
        eprintln!("Skipping: could not render test clip");
        return;
    }

    let probe = probe_video(&tools, &clip, std::time::Duration::from_secs(30))
        .await
        .unwrap();
    assert!((probe.duration_secs - 2.0).abs() < 0.5, "{probe:?}");
    assert_eq!(probe.width, Some(1280));
    assert_eq!(probe.height, Some(720));
}

#[tokio::test]
async fn synchronous_upload_produces_all_artifacts() {
    let Some(tools) = tools() else { return };
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.uploads.root = dir.path().join("uploads");
    config.video.preset = "ultrafast".into();
    config.uploads.layout().ensure().unwrap();

    let backend = Arc::new(FfmpegBackend::new(tools.clone(), config.video.clone()));
    let ctx = AppContext::new(config, tools.clone(), backend);
    let staged = ctx.orchestrator.layout().temp.join("holiday.mov");
    if !make_clip(&staged, 3) {
        eprintln!("Skipping: could not render test clip");
        return;
    }
    let size = std::fs::metadata(&staged).unwrap().len();

    let response = ctx
        .orchestrator
        .start_video_processing(
            UploadedFile {
                temp_path: staged,
                declared_mime_type: "video/quicktime".into(),
                original_name: "holiday.mov".into(),
                size,
            },
            false,
        )
        .await
        .unwrap();

    let root = &ctx.orchestrator.layout().root;
    let video = root.join(&response.video_url);
    assert!(video.exists());
    assert!(root.join(&response.cover_url).exists());
    assert!(root.join(&response.thumbnail_url).exists());

    let out = probe_video(&tools, &video, std::time::Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(out.width, Some(720));

    let view = ctx.orchestrator.get_progress(response.job_id).unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.progress, 100);
}

#[tokio::test]
async fn garbage_input_fails_cleanly() {
    let Some(tools) = tools() else { return };
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.uploads.root = dir.path().to_path_buf();
    config.uploads.layout().ensure().unwrap();

    let backend = Arc::new(FfmpegBackend::new(tools.clone(), config.video.clone()));
    let ctx = AppContext::new(config, tools, backend);
    let staged = ctx.orchestrator.layout().temp.join("noise.mp4");
    std::fs::write(&staged, vec![0x5au8; 4096]).unwrap();

    let err = ctx
        .orchestrator
        .start_video_processing(
            UploadedFile {
                temp_path: staged,
                declared_mime_type: "video/mp4".into(),
                original_name: "noise.mp4".into(),
                size: 4096,
            },
            false,
        )
        .await
        .unwrap_err();
    assert!(!err.is_input_rejection());

    for sub in ["videos", "covers", "thumbnails", "temp"] {
        assert_eq!(std::fs::read_dir(dir.path().join(sub)).unwrap().count(), 0, "{sub}");
    }
}
