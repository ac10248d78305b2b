//! Image and avatar recompression to lossy WebP.
//!
//! Both transcoders are blocking and single-shot: decode the whole file,
//! resize, encode, write `<stem>.webp` into the target directory and delete
//! the source. Callers on an async runtime should wrap them in
//! `tokio::task::spawn_blocking`.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tl_core::config::{AvatarConfig, ImageConfig};
use tl_core::MediaKind;

/// Recompress a general image, scaling it down to `config.max_width`.
///
/// Images narrower than the limit keep their native width; this path never
/// upscales. Returns the output file name.
pub fn transcode_image(
    source: &Path,
    target_dir: &Path,
    config: &ImageConfig,
) -> tl_core::Result<String> {
    let img = decode(source, MediaKind::Image)?;
    let (width, height) = img.dimensions();
    let target_width = config.max_width.min(width);

    let resized = if target_width < width {
        img.resize(target_width, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };

    tracing::debug!(
        "Image {:?}: {width}x{height} -> {}x{} (quality {})",
        source,
        resized.width(),
        resized.height(),
        config.quality
    );

    finish(source, target_dir, &resized, config.quality, MediaKind::Image)
}

/// Produce a fixed square avatar by center-cropping to cover the canvas.
///
/// Unlike [`transcode_image`], small sources are scaled up to fill the
/// canvas. Returns the output file name.
pub fn transcode_avatar(
    source: &Path,
    target_dir: &Path,
    config: &AvatarConfig,
) -> tl_core::Result<String> {
    let img = decode(source, MediaKind::Avatar)?;
    let avatar = img.resize_to_fill(config.size, config.size, FilterType::Lanczos3);
    finish(source, target_dir, &avatar, config.quality, MediaKind::Avatar)
}

fn decode(source: &Path, kind: MediaKind) -> tl_core::Result<DynamicImage> {
    let bytes = std::fs::read(source)?;
    image::load_from_memory(&bytes)
        .map_err(|e| tl_core::Error::processing(kind, format!("failed to decode image: {e}")))
}

fn finish(
    source: &Path,
    target_dir: &Path,
    img: &DynamicImage,
    quality: u8,
    kind: MediaKind,
) -> tl_core::Result<String> {
    let encoded = encode_webp(img, quality, kind)?;
    let file_name = output_name(source, kind)?;
    let output = target_dir.join(&file_name);

    std::fs::write(&output, &encoded)?;

    if let Err(e) = std::fs::remove_file(source) {
        tracing::warn!("Failed to remove source image {}: {e}", source.display());
    }

    tracing::info!(
        kind = %kind,
        output = %output.display(),
        bytes = encoded.len(),
        "Image transcoded"
    );
    Ok(file_name)
}

/// Encode as lossy WebP at `quality` (clamped to 1..=100).
fn encode_webp(img: &DynamicImage, quality: u8, kind: MediaKind) -> tl_core::Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let quality = f32::from(quality.clamp(1, 100));
    let memory = encoder
        .encode_simple(false, quality)
        .map_err(|e| tl_core::Error::processing(kind, format!("WebP encoding failed: {e:?}")))?;
    Ok(memory.to_vec())
}

/// `<stem>.webp` for the source file.
fn output_name(source: &Path, kind: MediaKind) -> tl_core::Result<String> {
    source
        .file_stem()
        .map(|stem| format!("{}.webp", stem.to_string_lossy()))
        .ok_or_else(|| {
            tl_core::Error::processing(kind, format!("source has no file name: {}", source.display()))
        })
}
