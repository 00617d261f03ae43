use std::time::Duration;

use chrono::FixedOffset;

use crate::settings::PipelineSettings;

/// A card at least this long is closed and never reopened by a merge.
pub const CLOSED_CARD_MINUTES: i64 = 40;

/// Largest gap between the last card's end and the draft's start that still allows a merge.
pub const MAX_MERGE_GAP_MINUTES: i64 = 5;

/// Hard ceiling on the span of any card produced by a merge.
pub const MAX_MERGED_SPAN_MINUTES: i64 = 60;

/// Tunables for one pipeline instance. Merge thresholds stay fixed (see constants above).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sample_target: usize,
    pub max_frame_height: u32,
    pub jpeg_quality: u8,
    pub caption_concurrency: usize,
    /// Per caption request; a timeout drops the frame.
    pub caption_timeout: Duration,
    /// Per text-generation request after captioning.
    pub generation_timeout: Duration,
    /// Offset card times are rendered in.
    pub utc_offset: FixedOffset,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings {
            utc_offset_minutes: Some(0),
            ..PipelineSettings::default()
        })
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            sample_target: settings.sample_target.max(1),
            max_frame_height: settings.max_frame_height,
            jpeg_quality: settings.jpeg_quality.clamp(1, 100),
            caption_concurrency: settings.caption_concurrency.max(1),
            caption_timeout: Duration::from_secs(settings.caption_timeout_secs),
            generation_timeout: Duration::from_secs(settings.generation_timeout_secs),
            utc_offset: settings.utc_offset(),
        }
    }
}
