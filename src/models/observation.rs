use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded activity segment within one batch. Append-only once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub batch_id: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub text: String,
    pub source_model: String,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    pub fn duration_secs(&self) -> i64 {
        self.end_ts - self.start_ts
    }
}
