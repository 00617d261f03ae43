use std::path::PathBuf;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::backend::TextBackend;
use crate::models::{FrameDescription, SampledFrame, Screenshot};

use super::config::PipelineConfig;
use super::error::{PipelineError, Stage};
use super::with_timeout;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Caption every sampled screenshot, dropping frames that fail.
///
/// Frames are captioned by up to `caption_concurrency` requests at a time;
/// the result is always ordered by offset.
pub async fn describe_frames<B: TextBackend>(
    backend: &B,
    screenshots: &[Screenshot],
    batch_start: i64,
    config: &PipelineConfig,
) -> Result<Vec<FrameDescription>, PipelineError> {
    let mut descriptions: Vec<FrameDescription> = stream::iter(screenshots)
        .map(|shot| describe_one(backend, shot, batch_start, config))
        .buffer_unordered(config.caption_concurrency.max(1))
        .filter_map(|described| async move { described })
        .collect()
        .await;

    descriptions.sort_by_key(|description| description.timestamp_offset);

    if descriptions.is_empty() {
        return Err(PipelineError::NoFramesDescribed);
    }

    log_debug!(
        "described {}/{} frames",
        descriptions.len(),
        screenshots.len()
    );
    Ok(descriptions)
}

async fn describe_one<B: TextBackend>(
    backend: &B,
    shot: &Screenshot,
    batch_start: i64,
    config: &PipelineConfig,
) -> Option<FrameDescription> {
    let frame = match prepare_frame(shot, batch_start, config.max_frame_height, config.jpeg_quality).await {
        Ok(frame) => frame,
        Err(err) => {
            log_warn!("dropping frame {}: {err:#}", shot.file_path.display());
            return None;
        }
    };

    let offset = frame.timestamp_offset;
    match with_timeout(
        Stage::Caption,
        config.caption_timeout,
        backend.describe_frame(&frame.image_bytes),
    )
    .await
    {
        Ok(text) if !text.trim().is_empty() => Some(FrameDescription {
            timestamp_offset: offset,
            text: text.trim().to_string(),
        }),
        Ok(_) => {
            log_warn!("dropping frame at +{offset}s: empty caption");
            None
        }
        Err(err) => {
            log_warn!("dropping frame at +{offset}s: {err}");
            None
        }
    }
}

/// Load a screenshot from disk, bound its height and re-encode it as JPEG.
pub async fn prepare_frame(
    shot: &Screenshot,
    batch_start: i64,
    max_height: u32,
    jpeg_quality: u8,
) -> Result<SampledFrame> {
    let path: PathBuf = shot.file_path.clone();
    let image_bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let image = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        encode_frame(image, max_height, jpeg_quality)
    })
    .await
    .context("frame encoding worker join failed")??;

    Ok(SampledFrame {
        timestamp_offset: shot.captured_at - batch_start,
        image_bytes,
    })
}

/// Downscale to at most `max_height` (never upscale) and encode as RGB JPEG.
pub fn encode_frame(image: DynamicImage, max_height: u32, jpeg_quality: u8) -> Result<Vec<u8>> {
    let image = if max_height > 0 && image.height() > max_height {
        let width = (u64::from(image.width()) * u64::from(max_height) / u64::from(image.height()))
            .max(1) as u32;
        image.resize_exact(width, max_height, FilterType::Triangle)
    } else {
        image
    };

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100));
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .context("failed to encode frame as JPEG")?;
    Ok(buffer)
}
