//! Drafts one activity card from a batch's observations.

use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::TextBackend;
use crate::models::{ActivityCardData, AppSites, Distraction, Observation};
use crate::utils::structured::parse_payload;

use super::clock::format_card_time;
use super::error::{PipelineError, Stage};
use super::with_timeout;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Fields shared by the build-card and merge-build responses.
#[derive(Debug, Deserialize)]
pub(crate) struct CardFields {
    pub title: String,
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default, alias = "detailedSummary")]
    pub detailed_summary: Option<String>,
    #[serde(default)]
    pub distractions: Option<Vec<Value>>,
    #[serde(default, alias = "appSites")]
    pub app_sites: Option<AppSites>,
}

impl CardFields {
    /// Well-formed distraction entries; malformed ones are skipped.
    pub(crate) fn distractions(&self) -> Option<Vec<Distraction>> {
        self.distractions.as_ref().map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
    }
}

/// Map `raw` onto a taxonomy member: case-insensitive exact match, else the
/// first entry. Never returns a label outside `taxonomy` unless it is empty.
pub fn normalize_category(raw: &str, taxonomy: &[String]) -> String {
    let wanted = raw.trim();
    taxonomy
        .iter()
        .find(|label| label.trim().eq_ignore_ascii_case(wanted))
        .or_else(|| taxonomy.first())
        .cloned()
        .unwrap_or_else(|| wanted.to_string())
}

pub fn build_prompt(
    observations: &[Observation],
    taxonomy: &[String],
    previous: Option<&ActivityCardData>,
    offset: FixedOffset,
) -> String {
    let mut lines = String::new();
    for observation in observations {
        lines.push_str(&format!(
            "- {} to {}: {}\n",
            format_card_time(observation.start_ts, offset),
            format_card_time(observation.end_ts, offset),
            observation.text
        ));
    }

    let previous_hint = previous
        .map(|card| {
            format!(
                "The previous timeline entry was \"{}\" ({}). Reuse its wording if this is the same activity.\n\n",
                card.title, card.category
            )
        })
        .unwrap_or_default();

    format!(
        "Summarize this period of computer activity as one timeline card.\n\n\
Observations:\n{lines}\n\
{previous_hint}\
Allowed categories (pick exactly one): {categories}\n\n\
Respond with only a JSON object:\n\
{{\"title\": \"3-8 word title\", \"summary\": \"one sentence\", \"category\": \"one of the allowed categories\", \
\"subcategory\": \"optional\", \"detailed_summary\": \"optional, a few sentences\", \
\"distractions\": [{{\"start_time\": \"YYYY-MM-DD HH:MM\", \"end_time\": \"YYYY-MM-DD HH:MM\", \"title\": \"...\", \"summary\": \"...\"}}], \
\"app_sites\": {{\"primary\": \"main app or site\", \"secondary\": \"optional\"}}}}",
        categories = taxonomy.join(", ")
    )
}

/// Request a draft card spanning `[first.start_ts, last.end_ts]`.
pub async fn build_card<B: TextBackend>(
    backend: &B,
    observations: &[Observation],
    taxonomy: &[String],
    previous: Option<&ActivityCardData>,
    offset: FixedOffset,
    timeout: Duration,
) -> Result<ActivityCardData, PipelineError> {
    if taxonomy.is_empty() {
        return Err(PipelineError::EmptyTaxonomy);
    }

    let mut sorted = observations.to_vec();
    sorted.sort_by_key(|observation| observation.start_ts);
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Err(PipelineError::NoObservations);
    };

    let prompt = build_prompt(&sorted, taxonomy, previous, offset);
    let raw = with_timeout(Stage::BuildCard, timeout, backend.generate_structured(&prompt)).await?;

    let fields: CardFields = parse_payload(&raw).map_err(|err| {
        log_warn!("build-card response not parseable: {err}");
        PipelineError::MalformedResponse {
            stage: Stage::BuildCard,
            detail: err.to_string(),
        }
    })?;

    let category = normalize_category(&fields.category, taxonomy);
    if !category.eq_ignore_ascii_case(fields.category.trim()) {
        log_info!(
            "category '{}' not in taxonomy, using '{}'",
            fields.category,
            category
        );
    }

    Ok(ActivityCardData {
        start_time: format_card_time(first.start_ts, offset),
        end_time: format_card_time(last.end_ts, offset),
        category,
        subcategory: fields.subcategory.clone().unwrap_or_default(),
        title: fields.title.trim().to_string(),
        summary: fields.summary.trim().to_string(),
        detailed_summary: fields.detailed_summary.clone().unwrap_or_default(),
        distractions: fields.distractions().unwrap_or_default(),
        app_sites: fields.app_sites.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use chrono::Utc;
    use std::sync::Mutex;

    fn taxonomy() -> Vec<String> {
        vec!["Coding".into(), "Meetings".into(), "Browsing".into()]
    }

    struct CannedBackend {
        reply: Result<String, BackendError>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextBackend for CannedBackend {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn describe_frame(&self, _image: &[u8]) -> Result<String, BackendError> {
            unreachable!()
        }

        async fn generate_structured(&self, prompt: &str) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }

        async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
            self.generate_structured(prompt).await
        }
    }

    fn observation(start_ts: i64, end_ts: i64, text: &str) -> Observation {
        Observation {
            batch_id: "b".into(),
            start_ts,
            end_ts,
            text: text.into(),
            source_model: "m".into(),
            created_at: Utc::now(),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    // 2024-01-01 12:00 UTC
    const NOON: i64 = 1_704_110_400;

    #[test]
    fn category_matches_case_insensitively() {
        assert_eq!(normalize_category("  meetings ", &taxonomy()), "Meetings");
        assert_eq!(normalize_category("CODING", &taxonomy()), "Coding");
    }

    #[test]
    fn unknown_category_falls_back_to_first_entry() {
        assert_eq!(normalize_category("Gaming", &taxonomy()), "Coding");
        assert_eq!(normalize_category("", &taxonomy()), "Coding");
        assert_eq!(normalize_category("Meeting", &taxonomy()), "Coding");
    }

    #[test]
    fn normalized_category_is_always_a_member() {
        let inputs = ["", "x", "coding", "BROWSING", "Meetings!", "ünïcode", "Coding Coding"];
        for input in inputs {
            assert!(taxonomy().contains(&normalize_category(input, &taxonomy())));
        }
    }

    #[tokio::test]
    async fn draft_spans_first_start_to_last_end() {
        let backend = CannedBackend::replying(
            r#"```json
{"title": "Coding session", "summary": "Wrote code.", "category": "coding",
 "app_sites": {"primary": "Zed"}, "distractions": [{"bogus": true},
 {"start_time": "2024-01-01 12:03", "end_time": "2024-01-01 12:04", "title": "Chat"}]}
```"#,
        );
        let observations = vec![
            observation(NOON + 300, NOON + 600, "tests"),
            observation(NOON, NOON + 300, "editing"),
        ];

        let card = build_card(&backend, &observations, &taxonomy(), None, utc(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(card.start_time, "2024-01-01 12:00");
        assert_eq!(card.end_time, "2024-01-01 12:10");
        assert_eq!(card.title, "Coding session");
        assert_eq!(card.category, "Coding");
        assert_eq!(card.app_sites.primary.as_deref(), Some("Zed"));
        assert_eq!(card.distractions.len(), 1);
        assert_eq!(card.distractions[0].title, "Chat");

        let prompt = backend.prompts.lock().unwrap()[0].clone();
        assert!(prompt.find("editing").unwrap() < prompt.find("tests").unwrap());
        assert!(prompt.contains("Coding, Meetings, Browsing"));
    }

    #[tokio::test]
    async fn unparseable_card_fails_the_batch() {
        let backend = CannedBackend::replying("I think this was coding.");
        let err = build_card(
            &backend,
            &[observation(NOON, NOON + 60, "x")],
            &taxonomy(),
            None,
            utc(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse { stage: Stage::BuildCard, .. }));
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let backend = CannedBackend {
            reply: Err(BackendError::Status {
                status: 401,
                body: "bad key".into(),
            }),
            prompts: Mutex::new(Vec::new()),
        };
        let err = build_card(
            &backend,
            &[observation(NOON, NOON + 60, "x")],
            &taxonomy(),
            None,
            utc(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Backend { stage: Stage::BuildCard, .. }));
    }

    #[tokio::test]
    async fn empty_inputs_are_rejected_before_calling_the_backend() {
        let backend = CannedBackend::replying("{}");
        let err = build_card(&backend, &[], &taxonomy(), None, utc(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoObservations));

        let err = build_card(&backend, &[observation(0, 1, "x")], &[], None, utc(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyTaxonomy));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}
