//! Screenshots in, timeline cards out.
//!
//! [`Pipeline::transcribe`] turns one batch of screenshots into observations;
//! [`Pipeline::build_or_merge_card`] folds those observations into the running
//! timeline. Neither keeps state between calls: the timeline travels in the
//! [`ActivityGenerationContext`].

pub mod card_builder;
pub mod clock;
pub mod config;
pub mod describer;
pub mod error;
pub mod merge_policy;
pub mod observations;
pub mod sampler;

use std::future::Future;
use std::time::Duration;

use crate::backend::{BackendError, TextBackend};
use crate::models::{ActivityCardData, ActivityGenerationContext, Observation, Screenshot};

pub use config::PipelineConfig;
pub use error::{PipelineError, Stage};
pub use merge_policy::{AppendReason, MergeDecision};

use observations::BatchWindow;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Bound one backend call. Transport errors and timeouts are both tagged with `stage`.
pub(crate) async fn with_timeout<F>(stage: Stage, after: Duration, call: F) -> Result<String, PipelineError>
where
    F: Future<Output = Result<String, BackendError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(source)) => Err(PipelineError::Backend { stage, source }),
        Err(_) => Err(PipelineError::Timeout { stage, after }),
    }
}

pub struct Pipeline<B> {
    backend: B,
    config: PipelineConfig,
}

impl<B: TextBackend> Pipeline<B> {
    pub fn new(backend: B, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sample, caption and segment one batch.
    pub async fn transcribe(
        &self,
        batch_id: &str,
        screenshots: &[Screenshot],
        batch_start: i64,
    ) -> Result<Vec<Observation>, PipelineError> {
        let Some(last_capture) = screenshots.iter().map(|shot| shot.captured_at).max() else {
            return Err(PipelineError::NoFramesDescribed);
        };
        let window = BatchWindow::new(batch_start, last_capture);

        let sampled = sampler::sample_screenshots(screenshots.to_vec(), self.config.sample_target);
        log_info!(
            "batch {batch_id}: sampled {} of {} screenshot(s)",
            sampled.len(),
            screenshots.len()
        );

        let descriptions =
            describer::describe_frames(&self.backend, &sampled, batch_start, &self.config).await?;

        observations::merge_observations(
            &self.backend,
            batch_id,
            &descriptions,
            window,
            self.config.generation_timeout,
        )
        .await
    }

    /// Draft a card from `context.batch_observations` and return the next timeline.
    ///
    /// `context.existing_cards` is never modified; on error the caller's timeline
    /// is simply left as it was.
    pub async fn build_or_merge_card(
        &self,
        context: &ActivityGenerationContext,
    ) -> Result<Vec<ActivityCardData>, PipelineError> {
        let previous = context.existing_cards.last();

        let draft = card_builder::build_card(
            &self.backend,
            &context.batch_observations,
            &context.categories,
            previous,
            self.config.utc_offset,
            self.config.generation_timeout,
        )
        .await?;

        let decision = merge_policy::decide(
            &self.backend,
            previous,
            &draft,
            &context.categories,
            self.config.generation_timeout,
        )
        .await;

        Ok(merge_policy::apply(
            context.existing_cards.clone(),
            draft,
            decision,
        ))
    }
}
