use anyhow::{Context, Result};
use rusqlite::{params, Row, Transaction};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{column_error, parse_datetime},
};
use crate::models::Observation;

fn row_to_observation(row: &Row) -> Result<Observation, rusqlite::Error> {
    let created_at: String = row.get("created_at")?;

    Ok(Observation {
        batch_id: row.get("batch_id")?,
        start_ts: row.get("start_ts")?,
        end_ts: row.get("end_ts")?,
        text: row.get("text")?,
        source_model: row.get("source_model")?,
        created_at: parse_datetime(&created_at, "created_at").map_err(column_error)?,
    })
}

/// Append-only: observations are never updated or deleted.
pub(super) fn insert_observations(tx: &Transaction<'_>, observations: &[Observation]) -> Result<()> {
    for observation in observations {
        tx.execute(
            "INSERT INTO observations (id, batch_id, start_ts, end_ts, text, source_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                observation.batch_id,
                observation.start_ts,
                observation.end_ts,
                observation.text,
                observation.source_model,
                observation.created_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("failed to insert observation for batch {}", observation.batch_id))?;
    }
    Ok(())
}

impl Database {
    pub async fn observations_for_batch(&self, batch_id: &str) -> Result<Vec<Observation>> {
        let batch_id = batch_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT batch_id, start_ts, end_ts, text, source_model, created_at
                 FROM observations
                 WHERE batch_id = ?1
                 ORDER BY start_ts ASC",
            )?;
            let observations = stmt
                .query_map(params![batch_id], row_to_observation)?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to load observations")?;
            Ok(observations)
        })
        .await
    }
}
