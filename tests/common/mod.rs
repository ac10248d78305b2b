//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over a
//! temporary upload root and a [`ScriptedBackend`] so video jobs run without
//! ffmpeg. [`TestHarness::with_server`] starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use tempfile::TempDir;

use tl_core::config::Config;
use tl_media::testing::ScriptedBackend;
use tl_media::ToolRegistry;
use tl_server::context::AppContext;
use tl_server::router::build_router;

/// Test harness wrapping an [`AppContext`] rooted in a temp directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub backend: ScriptedBackend,
    root: TempDir,
}

impl TestHarness {
    /// Default configuration and an instant scripted backend.
    pub fn new() -> Self {
        Self::with(ScriptedBackend::new(), |_| {})
    }

    /// Custom backend and config tweaks. The upload root is always a fresh
    /// temp directory.
    pub fn with(backend: ScriptedBackend, tweak: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp upload root");
        let mut config = Config::default();
        config.uploads.root = root.path().to_path_buf();
        tweak(&mut config);
        config
            .uploads
            .layout()
            .ensure()
            .expect("failed to create upload layout");

        let ctx = AppContext::new(
            config,
            Arc::new(ToolRegistry::default()),
            Arc::new(backend.clone()),
        );

        Self { ctx, backend, root }
    }

    /// Start an Axum server for `self` on a random port.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Default harness plus a running server.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Number of entries in an upload subdirectory.
    pub fn count(&self, dir: &str) -> usize {
        std::fs::read_dir(self.root().join(dir))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Write `bytes` into the staging directory, as the upload layer would.
    pub fn stage(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.ctx.orchestrator.layout().temp.join(name);
        std::fs::write(&path, bytes).expect("failed to stage file");
        path
    }
}

/// Encode a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("failed to encode png");
    bytes
}

/// Dimensions of an encoded image file.
pub fn image_dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).expect("failed to read image dimensions")
}

/// Poll the progress endpoint until the job is terminal, returning every
/// observation in order.
pub async fn poll_until_terminal(addr: SocketAddr, job_id: &str) -> Vec<serde_json::Value> {
    let url = format!("http://{addr}/api/uploads/video-progress/{job_id}");
    let mut seen = Vec::new();
    for _ in 0..500 {
        let resp = reqwest::get(&url).await.expect("progress request failed");
        assert_eq!(resp.status(), 200, "job vanished while polling");
        let view: serde_json::Value = resp.json().await.expect("progress body");
        let status = view["status"].as_str().unwrap_or_default().to_string();
        seen.push(view);
        if status == "completed" || status == "error" {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}
