//! Decides whether a draft card extends the timeline or merges into its tail.
//!
//! The cheap checks run first and never touch the backend:
//!
//! 1. empty timeline                         -> append
//! 2. tail lasted >= [`CLOSED_CARD_MINUTES`] -> append (closed cards stay closed)
//! 3. gap tail.end -> draft.start too large  -> append
//! 4. tail.start -> draft.end over ceiling   -> append
//!
//! Only then is the backend asked whether the two cards are one activity,
//! and if so to write the merged card. The merged card's span is checked
//! against the ceiling again before it replaces the tail. Every backend
//! failure on this path degrades to "append unmerged", which is always safe.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::TextBackend;
use crate::models::ActivityCardData;
use crate::utils::structured::parse_payload;

use super::card_builder::{normalize_category, CardFields};
use super::clock::{card_duration_minutes, minutes_between};
use super::config::{CLOSED_CARD_MINUTES, MAX_MERGED_SPAN_MINUTES, MAX_MERGE_GAP_MINUTES};
use super::error::Stage;
use super::with_timeout;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendReason {
    EmptyTimeline,
    ClosedCard { minutes: i64 },
    Gap { minutes: i64 },
    SpanCeiling { minutes: i64 },
    UnreadableTimes,
    Declined { reason: String },
    JudgmentUnavailable,
    MergeBuildUnavailable,
    MergedSpanInvalid,
    MergedTooLong { minutes: i64 },
}

impl fmt::Display for AppendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendReason::EmptyTimeline => write!(f, "timeline is empty"),
            AppendReason::ClosedCard { minutes } => write!(f, "last card is closed ({minutes}m)"),
            AppendReason::Gap { minutes } => write!(f, "gap of {minutes}m"),
            AppendReason::SpanCeiling { minutes } => write!(f, "combined span would be {minutes}m"),
            AppendReason::UnreadableTimes => write!(f, "card times unreadable"),
            AppendReason::Declined { reason } => write!(f, "backend declined: {reason}"),
            AppendReason::JudgmentUnavailable => write!(f, "merge judgment unavailable"),
            AppendReason::MergeBuildUnavailable => write!(f, "merged card unavailable"),
            AppendReason::MergedSpanInvalid => write!(f, "merged card has an invalid span"),
            AppendReason::MergedTooLong { minutes } => write!(f, "merged card would be {minutes}m"),
        }
    }
}

/// Outcome of the backend-free checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    Append(AppendReason),
    Consult { gap_minutes: i64, span_minutes: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    Append(AppendReason),
    /// Replace the tail with this card.
    Merge(ActivityCardData),
}

#[derive(Debug, Deserialize)]
struct Judgment {
    #[serde(default)]
    combine: bool,
    #[serde(default)]
    reason: String,
}

pub fn precheck(last: Option<&ActivityCardData>, draft: &ActivityCardData) -> Precheck {
    let Some(last) = last else {
        return Precheck::Append(AppendReason::EmptyTimeline);
    };

    let Some(last_minutes) = card_duration_minutes(last) else {
        return Precheck::Append(AppendReason::UnreadableTimes);
    };
    if last_minutes >= CLOSED_CARD_MINUTES {
        return Precheck::Append(AppendReason::ClosedCard {
            minutes: last_minutes,
        });
    }

    let Some(gap_minutes) = minutes_between(&last.end_time, &draft.start_time) else {
        return Precheck::Append(AppendReason::UnreadableTimes);
    };
    if gap_minutes > MAX_MERGE_GAP_MINUTES {
        return Precheck::Append(AppendReason::Gap {
            minutes: gap_minutes,
        });
    }

    let Some(span_minutes) = minutes_between(&last.start_time, &draft.end_time) else {
        return Precheck::Append(AppendReason::UnreadableTimes);
    };
    if span_minutes > MAX_MERGED_SPAN_MINUTES {
        return Precheck::Append(AppendReason::SpanCeiling {
            minutes: span_minutes,
        });
    }

    Precheck::Consult {
        gap_minutes,
        span_minutes,
    }
}

/// Run the full decision for `draft` against the timeline tail `last`.
pub async fn decide<B: TextBackend>(
    backend: &B,
    last: Option<&ActivityCardData>,
    draft: &ActivityCardData,
    taxonomy: &[String],
    timeout: Duration,
) -> MergeDecision {
    let decision = consult(backend, last, draft, taxonomy, timeout).await;
    match &decision {
        MergeDecision::Append(reason) => {
            log_info!("appending '{}' ({reason})", draft.title)
        }
        MergeDecision::Merge(merged) => log_info!(
            "merged into '{}' {} - {}",
            merged.title,
            merged.start_time,
            merged.end_time
        ),
    }
    decision
}

async fn consult<B: TextBackend>(
    backend: &B,
    last: Option<&ActivityCardData>,
    draft: &ActivityCardData,
    taxonomy: &[String],
    timeout: Duration,
) -> MergeDecision {
    let Some(last) = last else {
        return MergeDecision::Append(AppendReason::EmptyTimeline);
    };
    if let Precheck::Append(reason) = precheck(Some(last), draft) {
        return MergeDecision::Append(reason);
    }

    let judgment_raw = match with_timeout(
        Stage::MergeJudgment,
        timeout,
        backend.generate_structured(&judgment_prompt(last, draft)),
    )
    .await
    {
        Ok(raw) => raw,
        Err(err) => {
            log_warn!("{err}; keeping cards separate");
            return MergeDecision::Append(AppendReason::JudgmentUnavailable);
        }
    };

    let judgment = parse_judgment(&judgment_raw);
    if !judgment.combine {
        return MergeDecision::Append(AppendReason::Declined {
            reason: judgment.reason,
        });
    }

    let merged_raw = match with_timeout(
        Stage::MergeBuild,
        timeout,
        backend.generate_structured(&merge_prompt(last, draft, taxonomy)),
    )
    .await
    {
        Ok(raw) => raw,
        Err(err) => {
            log_warn!("{err}; keeping the newer card");
            return MergeDecision::Append(AppendReason::MergeBuildUnavailable);
        }
    };

    match parse_payload::<CardFields>(&merged_raw) {
        Ok(fields) => verify_merged(assemble_merged(last, draft, &fields, taxonomy)),
        Err(err) => {
            log_warn!("merge-build response not parseable ({err}); keeping the newer card");
            MergeDecision::Append(AppendReason::MergeBuildUnavailable)
        }
    }
}

fn parse_judgment(raw: &str) -> Judgment {
    parse_payload::<Judgment>(raw).unwrap_or_else(|err| {
        log_warn!("merge judgment not parseable ({err}); not combining");
        Judgment {
            combine: false,
            reason: "unparseable judgment".into(),
        }
    })
}

fn assemble_merged(
    last: &ActivityCardData,
    draft: &ActivityCardData,
    fields: &CardFields,
    taxonomy: &[String],
) -> ActivityCardData {
    let distractions = fields.distractions().unwrap_or_else(|| {
        last.distractions
            .iter()
            .chain(draft.distractions.iter())
            .cloned()
            .collect()
    });

    let detailed_summary = fields.detailed_summary.clone().unwrap_or_else(|| {
        [last.detailed_summary.as_str(), draft.detailed_summary.as_str()]
            .iter()
            .filter(|text| !text.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    });

    let app_sites = fields
        .app_sites
        .clone()
        .filter(|sites| !sites.is_empty())
        .unwrap_or_else(|| last.app_sites.clone());

    // Span is always last.start to draft.end; response times are ignored.
    ActivityCardData {
        start_time: last.start_time.clone(),
        end_time: draft.end_time.clone(),
        category: normalize_category(&fields.category, taxonomy),
        subcategory: fields
            .subcategory
            .clone()
            .unwrap_or_else(|| last.subcategory.clone()),
        title: fields.title.trim().to_string(),
        summary: fields.summary.trim().to_string(),
        detailed_summary,
        distractions,
        app_sites,
    }
}

/// Re-check the ceiling on the card the backend actually produced.
pub fn verify_merged(merged: ActivityCardData) -> MergeDecision {
    match card_duration_minutes(&merged) {
        Some(minutes) if minutes < 0 => MergeDecision::Append(AppendReason::MergedSpanInvalid),
        Some(minutes) if minutes > MAX_MERGED_SPAN_MINUTES => {
            MergeDecision::Append(AppendReason::MergedTooLong { minutes })
        }
        Some(_) => MergeDecision::Merge(merged),
        None => MergeDecision::Append(AppendReason::MergedSpanInvalid),
    }
}

/// Produce the next timeline. Appends keep the timeline ordered by start time.
pub fn apply(
    mut timeline: Vec<ActivityCardData>,
    draft: ActivityCardData,
    decision: MergeDecision,
) -> Vec<ActivityCardData> {
    match decision {
        MergeDecision::Merge(merged) => {
            timeline.pop();
            timeline.push(merged);
        }
        MergeDecision::Append(_) => {
            // Card times are zero-padded, so string order is chronological order.
            let position = timeline.partition_point(|card| card.start_time <= draft.start_time);
            timeline.insert(position, draft);
        }
    }
    timeline
}

fn card_json(card: &ActivityCardData) -> String {
    serde_json::to_string_pretty(card).unwrap_or_else(|_| card.title.clone())
}

fn judgment_prompt(last: &ActivityCardData, draft: &ActivityCardData) -> String {
    format!(
        "Two consecutive timeline cards describe someone's computer activity.\n\n\
Earlier card:\n{}\n\nLater card:\n{}\n\n\
Should they be combined into one card because they describe the same continuous activity? \
Only combine when the later card clearly continues the earlier one.\n\n\
Respond with only a JSON object: {{\"combine\": true or false, \"reason\": \"short explanation\"}}",
        card_json(last),
        card_json(draft)
    )
}

fn merge_prompt(last: &ActivityCardData, draft: &ActivityCardData, taxonomy: &[String]) -> String {
    format!(
        "Combine these two consecutive timeline cards into a single card.\n\n\
Earlier card:\n{}\n\nLater card:\n{}\n\n\
The combined card runs from {} to {}. Allowed categories: {}.\n\n\
Respond with only a JSON object:\n\
{{\"title\": \"3-8 words\", \
\"summary\": \"one sentence\", \"category\": \"...\", \"subcategory\": \"...\", \"detailed_summary\": \"...\", \
\"distractions\": [], \"app_sites\": {{\"primary\": \"...\", \"secondary\": \"...\"}}}}",
        card_json(last),
        card_json(draft),
        last.start_time,
        draft.end_time,
        taxonomy.join(", ")
    )
}
