//! Turns timestamped captions into non-overlapping activity segments.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::TextBackend;
use crate::models::{FrameDescription, Observation};
use crate::utils::structured::parse_payload;

use super::error::{PipelineError, Stage};
use super::with_timeout;

const ENABLE_LOGS: bool = true;

/// How far past the last capture a segment may run.
const TRAILING_SLACK_SECS: i64 = 300;

use crate::{log_info, log_warn};

/// Absolute bounds of a batch, in epoch seconds. Always `start_ts < end_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl BatchWindow {
    /// A window covering a single instant is widened by one second.
    pub fn new(start_ts: i64, end_ts: i64) -> Self {
        Self {
            start_ts,
            end_ts: end_ts.max(start_ts + 1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SegmentDraft {
    #[serde(alias = "start", alias = "startOffset")]
    start_offset: Value,
    #[serde(alias = "end", alias = "endOffset")]
    end_offset: Value,
    #[serde(alias = "description", alias = "text")]
    observation: String,
}

pub fn build_prompt(descriptions: &[FrameDescription]) -> String {
    let mut frames = String::new();
    for description in descriptions {
        frames.push_str(&format!(
            "[{}] {}\n",
            format_offset(description.timestamp_offset),
            description.text
        ));
    }

    format!(
        "You are given short descriptions of screenshots taken during one stretch of computer use. \
Each line starts with its time offset from the start of the stretch as [MM:SS].\n\n\
{frames}\n\
Group these into contiguous, non-overlapping segments of related activity. \
Merge neighbouring frames that show the same task. For each segment write one or two sentences \
describing what the user was doing, naming the applications and content involved.\n\n\
Respond with only a JSON array, no prose:\n\
[{{\"start_offset\": <seconds>, \"end_offset\": <seconds>, \"observation\": \"...\"}}]"
    )
}

/// Ask the backend to segment `descriptions`, converting offsets to absolute time.
///
/// A response that cannot be parsed never fails the batch: it becomes one
/// observation spanning `window` that carries the raw response text.
pub async fn merge_observations<B: TextBackend>(
    backend: &B,
    batch_id: &str,
    descriptions: &[FrameDescription],
    window: BatchWindow,
    timeout: Duration,
) -> Result<Vec<Observation>, PipelineError> {
    let prompt = build_prompt(descriptions);
    let raw = with_timeout(
        Stage::MergeObservations,
        timeout,
        backend.generate_text(&prompt),
    )
    .await?;

    let observations = parse_observations(&raw, batch_id, window, backend.model_name(), descriptions);
    log_info!(
        "batch {batch_id}: {} observation(s) from {} description(s)",
        observations.len(),
        descriptions.len()
    );
    Ok(observations)
}

/// Parse a segmentation response, falling back to a single full-window observation.
pub fn parse_observations(
    raw: &str,
    batch_id: &str,
    window: BatchWindow,
    source_model: &str,
    descriptions: &[FrameDescription],
) -> Vec<Observation> {
    let (segments, fallback) = match parse_payload::<Vec<SegmentDraft>>(raw) {
        Ok(drafts) => (to_segments(drafts, window), joined_captions(descriptions)),
        Err(err) => {
            log_warn!("batch {batch_id}: segmentation response not parseable ({err}); using one span");
            (Vec::new(), raw.trim().to_string())
        }
    };

    let created_at = Utc::now();
    if segments.is_empty() {
        let text = if fallback.is_empty() {
            fallback_text(raw, descriptions)
        } else {
            fallback
        };
        return vec![Observation {
            batch_id: batch_id.to_string(),
            start_ts: window.start_ts,
            end_ts: window.end_ts,
            text,
            source_model: source_model.to_string(),
            created_at,
        }];
    }

    segments
        .into_iter()
        .map(|(start_ts, end_ts, text)| Observation {
            batch_id: batch_id.to_string(),
            start_ts,
            end_ts,
            text,
            source_model: source_model.to_string(),
            created_at,
        })
        .collect()
}

/// Absolute, sorted, non-overlapping `(start, end, text)` triples.
///
/// Ends are capped at the window end plus [`TRAILING_SLACK_SECS`]; segments
/// starting beyond that cap, or whose times overflow, are dropped.
fn to_segments(drafts: Vec<SegmentDraft>, window: BatchWindow) -> Vec<(i64, i64, String)> {
    let ceiling = window.end_ts.saturating_add(TRAILING_SLACK_SECS);
    let mut segments: Vec<(i64, i64, String)> = drafts
        .into_iter()
        .filter_map(|draft| {
            let start = window.start_ts.checked_add(parse_offset(&draft.start_offset)?)?;
            let end = window
                .start_ts
                .checked_add(parse_offset(&draft.end_offset)?)?
                .min(ceiling);
            let text = draft.observation.trim().to_string();
            (end > start && !text.is_empty()).then_some((start, end, text))
        })
        .collect();

    segments.sort_by_key(|(start, _, _)| *start);

    let mut trimmed: Vec<(i64, i64, String)> = Vec::with_capacity(segments.len());
    for (start, end, text) in segments {
        let start = match trimmed.last() {
            Some((_, previous_end, _)) => start.max(*previous_end),
            None => start,
        };
        if end > start {
            trimmed.push((start, end, text));
        }
    }
    trimmed
}

/// Seconds from a number, `"MM:SS"` or `"HH:MM:SS"`.
fn parse_offset(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(number) => number.as_f64().and_then(whole_seconds),
        Value::String(text) => {
            let text = text.trim();
            if text.contains(':') {
                text.split(':').try_fold(0i64, |total, part| {
                    let n = part.trim().parse::<i64>().ok()?;
                    total.checked_mul(60)?.checked_add(n)
                })
            } else {
                text.parse::<f64>().ok().and_then(whole_seconds)
            }
        }
        _ => None,
    };
    secs.filter(|secs| *secs >= 0)
}

fn whole_seconds(secs: f64) -> Option<i64> {
    let secs = secs.round();
    (secs.is_finite() && secs.abs() < i64::MAX as f64).then_some(secs as i64)
}

fn format_offset(offset: i64) -> String {
    let offset = offset.max(0);
    format!("{:02}:{:02}", offset / 60, offset % 60)
}

fn fallback_text(raw: &str, descriptions: &[FrameDescription]) -> String {
    let raw = raw.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }
    joined_captions(descriptions)
}

fn joined_captions(descriptions: &[FrameDescription]) -> String {
    descriptions
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
