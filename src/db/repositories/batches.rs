use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{column_error, parse_datetime, parse_status},
};
use crate::models::{Batch, BatchRecord, BatchStatus};

fn row_to_batch(row: &Row) -> Result<BatchRecord, rusqlite::Error> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(BatchRecord {
        id: row.get("id")?,
        start_ts: row.get("start_ts")?,
        end_ts: row.get("end_ts")?,
        status: parse_status(&status).map_err(column_error)?,
        reason: row.get("reason")?,
        created_at: parse_datetime(&created_at, "created_at").map_err(column_error)?,
        updated_at: parse_datetime(&updated_at, "updated_at").map_err(column_error)?,
    })
}

impl Database {
    /// Register a batch as pending. Returns `false` if it was already known.
    pub async fn insert_batch(&self, batch: &Batch) -> Result<bool> {
        let id = batch.id.clone();
        let (start_ts, end_ts) = (batch.start_ts, batch.end_ts);
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO batches (id, start_ts, end_ts, status, reason, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
                    params![id, start_ts, end_ts, BatchStatus::Pending.as_str(), now],
                )
                .context("failed to insert batch")?;
            Ok(inserted > 0)
        })
        .await
    }

    pub async fn mark_batch_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
        reason: Option<String>,
    ) -> Result<()> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE batches
                 SET status = ?1,
                     reason = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![status.as_str(), reason, Utc::now().to_rfc3339(), batch_id],
            )
            .context("failed to update batch status")?;
            Ok(())
        })
        .await
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT id, start_ts, end_ts, status, reason, created_at, updated_at
                 FROM batches
                 WHERE id = ?1",
                params![batch_id],
                row_to_batch,
            )
            .optional()
            .context("failed to load batch")
        })
        .await
    }
}
