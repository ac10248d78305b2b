//! HTTP upload integration tests.
//!
//! Drives the upload routes over real HTTP against a [`TestHarness`] server
//! with a scripted video backend.

mod common;

use common::{image_dimensions, png_bytes, poll_until_terminal, TestHarness};
use reqwest::multipart::{Form, Part};
use tl_media::testing::{ScriptedBackend, CORRUPT_MARKER};

fn file_part(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
    Part::bytes(bytes)
        .file_name(name.to_string())
        .mime_str(mime)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wide_image_is_downscaled_to_800() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("images", file_part(png_bytes(4000, 1000), "wide.png", "image/png"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    let url = files[0].as_str().unwrap();
    assert!(url.starts_with("images/"));
    assert!(url.ends_with(".webp"));

    let (w, h) = image_dimensions(&harness.root().join(url));
    assert_eq!(w, 800);
    assert_eq!(h, 200);
    assert_eq!(harness.count("temp"), 0);
}

#[tokio::test]
async fn small_image_is_not_upscaled() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("images", file_part(png_bytes(320, 240), "small.png", "image/png"));

    let json: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let url = json["files"][0].as_str().unwrap();
    assert_eq!(image_dimensions(&harness.root().join(url)), (320, 240));
}

#[tokio::test]
async fn multiple_images_are_processed_together() {
    let (harness, addr) = TestHarness::with_server().await;
    let mut form = Form::new();
    for i in 0..3 {
        form = form.part(
            "images",
            file_part(png_bytes(100 + i, 50), &format!("p{i}.png"), "image/png"),
        );
    }

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["files"].as_array().unwrap().len(), 3);
    assert_eq!(harness.count("images"), 3);
}

#[tokio::test]
async fn too_many_images_are_rejected() {
    let harness = TestHarness::with(ScriptedBackend::new(), |c| {
        c.uploads.max_images_per_request = 2
    });
    let (harness, addr) = harness.serve().await;
    let mut form = Form::new();
    for i in 0..3 {
        form = form.part(
            "images",
            file_part(png_bytes(10, 10), &format!("p{i}.png"), "image/png"),
        );
    }

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(harness.count("temp"), 0);
    assert_eq!(harness.count("images"), 0);
}

#[tokio::test]
async fn unsupported_image_type_is_415() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("images", file_part(b"%PDF-1.4".to_vec(), "doc.pdf", "application/pdf"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "unsupported_media_type");
    assert!(json["request_id"].is_string());
    assert_eq!(harness.count("temp"), 0);
}

#[tokio::test]
async fn missing_field_is_400() {
    let (_harness, addr) = TestHarness::with_server().await;
    let form = Form::new().text("caption", "no file here");

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/images"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ---------------------------------------------------------------------------
// Avatar
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tiny_avatar_is_upscaled_to_200_square() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("avatar", file_part(png_bytes(50, 50), "me.png", "image/png"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/avatar"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    let url = json["url"].as_str().unwrap();
    assert!(url.starts_with("avatars/"));
    assert_eq!(image_dimensions(&harness.root().join(url)), (200, 200));
}

#[tokio::test]
async fn oversized_avatar_is_413() {
    let harness = TestHarness::with(ScriptedBackend::new(), |c| c.avatar.max_file_bytes = 64);
    let (harness, addr) = harness.serve().await;
    let form = Form::new().part("avatar", file_part(png_bytes(300, 300), "big.png", "image/png"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/avatar"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    assert_eq!(harness.count("avatars"), 0);
    assert_eq!(harness.count("temp"), 0);
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fast_video_upload_returns_202_then_completes() {
    let harness = TestHarness::with(
        ScriptedBackend::new().with_step_delay(std::time::Duration::from_millis(20)),
        |_| {},
    );
    let (harness, addr) = harness.serve().await;
    let form = Form::new().part("video", file_part(b"fake mp4".to_vec(), "trip.mp4", "video/mp4"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/video?fast=true"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "processing");
    let job_id = json["job_id"].as_str().unwrap().to_string();
    let video_url = json["video_url"].as_str().unwrap().to_string();
    assert!(video_url.starts_with("videos/"));

    let seen = poll_until_terminal(addr, &job_id).await;
    let first = &seen[0];
    assert_ne!(first["status"], "completed");
    assert!(first["progress"].as_u64().unwrap() < 100);

    let progress: Vec<u64> = seen.iter().map(|v| v["progress"].as_u64().unwrap()).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");

    let last = seen.last().unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["progress"], 100);

    // Terminal polls are stable.
    let again: serde_json::Value = reqwest::get(format!(
        "http://{addr}/api/uploads/video-progress/{job_id}"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(&again, last);

    // The provisional URLs now resolve.
    let served = reqwest::get(format!("http://{addr}/uploads/{video_url}")).await.unwrap();
    assert_eq!(served.status(), 200);
    let cover = json["cover_url"].as_str().unwrap();
    assert!(harness.root().join(cover).exists());
    assert_eq!(harness.count("temp"), 0);
}

#[tokio::test]
async fn synchronous_video_upload_returns_201() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("video", file_part(b"fake mov".to_vec(), "sea.mov", "video/quicktime"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/video?fast=false"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    for key in ["video_url", "cover_url", "thumbnail_url"] {
        let url = json[key].as_str().unwrap();
        assert!(harness.root().join(url).exists(), "{key} missing");
    }
}

#[tokio::test]
async fn corrupt_video_ends_in_error_without_output() {
    let (harness, addr) = TestHarness::with_server().await;
    let mut bytes = CORRUPT_MARKER.to_vec();
    bytes.extend_from_slice(b"\x00\x01garbage");
    let form = Form::new().part("video", file_part(bytes, "broken.mp4", "video/mp4"));

    let json: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/video"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = json["job_id"].as_str().unwrap().to_string();

    let seen = poll_until_terminal(addr, &job_id).await;
    let last = seen.last().unwrap();
    assert_eq!(last["status"], "error");
    assert!(last["error"].is_string());

    assert_eq!(harness.count("videos"), 0);
    assert_eq!(harness.count("covers"), 0);
    assert_eq!(harness.count("thumbnails"), 0);
    assert_eq!(harness.count("temp"), 0);
}

#[tokio::test]
async fn video_with_image_mime_is_rejected_without_job() {
    let (harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("video", file_part(png_bytes(8, 8), "still.png", "image/png"));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/video"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    assert!(harness.ctx.tracker.is_empty());
}

// ---------------------------------------------------------------------------
// Progress polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_404() {
    let (_harness, addr) = TestHarness::with_server().await;
    let id = tl_core::JobId::new();

    let resp = reqwest::get(format!("http://{addr}/api/uploads/video-progress/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn malformed_job_id_is_400() {
    let (_harness, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/uploads/video-progress/12345"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_tools_lists_known_tools() {
    let (_harness, addr) = TestHarness::with_server().await;

    let json: serde_json::Value = reqwest::get(format!("http://{addr}/api/admin/tools"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
}

#[tokio::test]
async fn admin_jobs_lists_finished_video() {
    let (_harness, addr) = TestHarness::with_server().await;
    let form = Form::new().part("video", file_part(b"fake".to_vec(), "a.mp4", "video/mp4"));
    reqwest::Client::new()
        .post(format!("http://{addr}/api/uploads/video?fast=false"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    let json: serde_json::Value = reqwest::get(format!("http://{addr}/api/admin/jobs"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["running"], 0);
    assert_eq!(json["jobs"][0]["status"], "completed");
}
