use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::backend::BackendError;

/// Step of the per-batch chain, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Caption,
    MergeObservations,
    BuildCard,
    MergeJudgment,
    MergeBuild,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Caption => "caption",
            Stage::MergeObservations => "merge-observations",
            Stage::BuildCard => "build-card",
            Stage::MergeJudgment => "merge-judgment",
            Stage::MergeBuild => "merge-build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no frames described")]
    NoFramesDescribed,
    #[error("batch has no observations")]
    NoObservations,
    #[error("category taxonomy is empty")]
    EmptyTaxonomy,
    #[error("{stage} returned an unusable response: {detail}")]
    MalformedResponse { stage: Stage, detail: String },
    #[error("{stage} request failed: {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },
    #[error("{stage} request timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
    #[error("batch processing cancelled")]
    Cancelled,
}
