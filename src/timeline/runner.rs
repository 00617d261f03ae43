use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::TextBackend;
use crate::db::Database;
use crate::models::{ActivityCardData, ActivityGenerationContext, Batch, BatchStatus, Observation};
use crate::pipeline::{clock::day_of, Pipeline, PipelineError};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Committed { observations: usize, cards: usize },
    /// Already analyzed on an earlier run.
    Skipped,
    Failed { reason: String },
    /// Put back to pending; nothing was written.
    Cancelled,
}

struct Decided {
    observations: Vec<Observation>,
    day: NaiveDate,
    timeline: Vec<ActivityCardData>,
}

/// Feeds batches through the pipeline one at a time and persists the result.
pub struct TimelineRunner<B> {
    pipeline: Pipeline<B>,
    db: Database,
    categories: Vec<String>,
    // One batch at a time per timeline: each decision depends on the previous tail.
    serial: Mutex<()>,
}

impl<B: TextBackend> TimelineRunner<B> {
    pub fn new(pipeline: Pipeline<B>, db: Database, categories: Vec<String>) -> Self {
        Self {
            pipeline,
            db,
            categories,
            serial: Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline<B> {
        &self.pipeline
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Process one batch end to end. The timeline is written at most once,
    /// and only after the append/merge decision is complete.
    pub async fn process_batch(&self, batch: &Batch, cancel: &CancellationToken) -> Result<BatchOutcome> {
        let _serial = self.serial.lock().await;

        if let Some(record) = self.db.get_batch(&batch.id).await? {
            if record.status == BatchStatus::Analyzed {
                log_info!("batch {} already analyzed, skipping", batch.id);
                return Ok(BatchOutcome::Skipped);
            }
        }

        self.db.insert_batch(batch).await?;
        self.db
            .mark_batch_status(&batch.id, BatchStatus::Processing, None)
            .await?;
        log_info!(
            "batch {} started ({} screenshot(s))",
            batch.id,
            batch.screenshots.len()
        );

        let decided = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(anyhow::Error::new(PipelineError::Cancelled)),
            result = self.decide(batch) => result,
        };

        let committed = match decided {
            Ok(decided) => self
                .db
                .commit_batch(&batch.id, &decided.observations, decided.day, &decided.timeline)
                .await
                .map(|()| decided),
            Err(err) => Err(err),
        };

        match committed {
            Ok(decided) => {
                log_info!(
                    "batch {} analyzed: {} observation(s), timeline now {} card(s)",
                    batch.id,
                    decided.observations.len(),
                    decided.timeline.len()
                );
                Ok(BatchOutcome::Committed {
                    observations: decided.observations.len(),
                    cards: decided.timeline.len(),
                })
            }
            Err(err) if is_cancelled(&err) => {
                log_warn!("batch {} cancelled", batch.id);
                self.db
                    .mark_batch_status(&batch.id, BatchStatus::Pending, None)
                    .await?;
                Ok(BatchOutcome::Cancelled)
            }
            Err(err) => {
                let reason = format!("{err:#}");
                log_error!("batch {} failed: {reason}", batch.id);
                self.db
                    .mark_batch_status(&batch.id, BatchStatus::Failed, Some(reason.clone()))
                    .await?;
                Ok(BatchOutcome::Failed { reason })
            }
        }
    }

    async fn decide(&self, batch: &Batch) -> Result<Decided> {
        let observations = self
            .pipeline
            .transcribe(&batch.id, &batch.screenshots, batch.start_ts)
            .await?;

        let day = day_of(batch.start_ts, self.pipeline.config().utc_offset);
        let existing_cards = self
            .db
            .load_timeline(day)
            .await
            .with_context(|| format!("failed to load timeline for {day}"))?;

        let context = ActivityGenerationContext {
            existing_cards,
            batch_observations: observations,
            categories: self.categories.clone(),
        };
        let timeline = self.pipeline.build_or_merge_card(&context).await?;

        Ok(Decided {
            observations: context.batch_observations,
            day,
            timeline,
        })
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Cancelled)
    )
}
