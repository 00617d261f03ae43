use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::BatchStatus;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_status(value: &str) -> Result<BatchStatus> {
    match value {
        "Pending" => Ok(BatchStatus::Pending),
        "Processing" => Ok(BatchStatus::Processing),
        "Analyzed" => Ok(BatchStatus::Analyzed),
        "Failed" => Ok(BatchStatus::Failed),
        other => Err(anyhow!("unknown batch status {other}")),
    }
}

/// Surface a conversion failure from inside a row mapper.
pub fn column_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        err.to_string(),
    )))
}
