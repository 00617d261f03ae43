use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Row};

use crate::db::{connection::Database, helpers::column_error};
use crate::models::{ActivityCardData, AppSites, BatchStatus, Observation};

use super::observations::insert_observations;

const DAY_FORMAT: &str = "%Y-%m-%d";

fn row_to_card(row: &Row) -> Result<ActivityCardData, rusqlite::Error> {
    let distractions_json: String = row.get("distractions_json")?;
    let distractions = serde_json::from_str(&distractions_json)
        .context("failed to parse distractions_json")
        .map_err(column_error)?;

    Ok(ActivityCardData {
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        category: row.get("category")?,
        subcategory: row.get("subcategory")?,
        title: row.get("title")?,
        summary: row.get("summary")?,
        detailed_summary: row.get("detailed_summary")?,
        distractions,
        app_sites: AppSites {
            primary: row.get("app_primary")?,
            secondary: row.get("app_secondary")?,
        },
    })
}

impl Database {
    /// The stored timeline for `day`, oldest card first.
    pub async fn load_timeline(&self, day: NaiveDate) -> Result<Vec<ActivityCardData>> {
        let day = day.format(DAY_FORMAT).to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT start_time, end_time, category, subcategory, title, summary,
                        detailed_summary, distractions_json, app_primary, app_secondary
                 FROM timeline_cards
                 WHERE day = ?1
                 ORDER BY position ASC",
            )?;
            let cards = stmt
                .query_map(params![day], row_to_card)?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to load timeline")?;
            Ok(cards)
        })
        .await
    }

    /// Apply one batch's outcome atomically: append its observations, replace
    /// the day's timeline with `cards` and mark the batch analyzed.
    pub async fn commit_batch(
        &self,
        batch_id: &str,
        observations: &[Observation],
        day: NaiveDate,
        cards: &[ActivityCardData],
    ) -> Result<()> {
        let batch_id = batch_id.to_string();
        let observations = observations.to_vec();
        let day = day.format(DAY_FORMAT).to_string();
        let cards = cards.to_vec();

        self.execute(move |conn| {
            let tx = conn.transaction()?;

            insert_observations(&tx, &observations)?;

            tx.execute("DELETE FROM timeline_cards WHERE day = ?1", params![day])
                .context("failed to clear timeline")?;

            for (position, card) in cards.iter().enumerate() {
                let distractions_json = serde_json::to_string(&card.distractions)
                    .context("failed to serialize distractions")?;
                tx.execute(
                    "INSERT INTO timeline_cards (
                        day,
                        position,
                        start_time,
                        end_time,
                        category,
                        subcategory,
                        title,
                        summary,
                        detailed_summary,
                        distractions_json,
                        app_primary,
                        app_secondary
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        day,
                        position as i64,
                        card.start_time,
                        card.end_time,
                        card.category,
                        card.subcategory,
                        card.title,
                        card.summary,
                        card.detailed_summary,
                        distractions_json,
                        card.app_sites.primary,
                        card.app_sites.secondary,
                    ],
                )
                .context("failed to insert timeline card")?;
            }

            tx.execute(
                "UPDATE batches
                 SET status = ?1,
                     reason = NULL,
                     updated_at = ?2
                 WHERE id = ?3",
                params![BatchStatus::Analyzed.as_str(), Utc::now().to_rfc3339(), batch_id],
            )
            .context("failed to mark batch analyzed")?;

            tx.commit().context("failed to commit batch")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, Distraction};
    use tempfile::tempdir;

    fn card(start: &str, end: &str, title: &str) -> ActivityCardData {
        ActivityCardData {
            start_time: format!("2024-01-01 {start}"),
            end_time: format!("2024-01-01 {end}"),
            category: "Coding".into(),
            subcategory: String::new(),
            title: title.into(),
            summary: "s".into(),
            detailed_summary: String::new(),
            distractions: vec![Distraction {
                start_time: format!("2024-01-01 {start}"),
                end_time: format!("2024-01-01 {start}"),
                title: "chat".into(),
                summary: String::new(),
            }],
            app_sites: AppSites {
                primary: Some("Zed".into()),
                secondary: None,
            },
        }
    }

    fn observation(batch_id: &str) -> Observation {
        Observation {
            batch_id: batch_id.into(),
            start_ts: 10,
            end_ts: 20,
            text: "writing code".into(),
            source_model: "m".into(),
            created_at: Utc::now(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    async fn register(db: &Database, id: &str) {
        db.insert_batch(&Batch {
            id: id.into(),
            start_ts: 0,
            end_ts: 30,
            screenshots: Vec::new(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn commit_replaces_timeline_and_appends_observations() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("timeline.db")).unwrap();
        register(&db, "b1").await;
        register(&db, "b2").await;

        let first = vec![card("10:00", "10:20", "a")];
        db.commit_batch("b1", &[observation("b1")], day(), &first)
            .await
            .unwrap();

        let second = vec![card("10:00", "10:40", "merged"), card("10:45", "10:50", "b")];
        db.commit_batch("b2", &[observation("b2"), observation("b2")], day(), &second)
            .await
            .unwrap();

        assert_eq!(db.load_timeline(day()).await.unwrap(), second);
        assert_eq!(db.observations_for_batch("b1").await.unwrap().len(), 1);
        assert_eq!(db.observations_for_batch("b2").await.unwrap().len(), 2);
        assert_eq!(
            db.get_batch("b2").await.unwrap().unwrap().status,
            BatchStatus::Analyzed
        );
    }

    #[tokio::test]
    async fn failed_commit_leaves_everything_untouched() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("timeline.db")).unwrap();
        register(&db, "b1").await;

        let timeline = vec![card("09:00", "09:10", "kept")];
        db.commit_batch("b1", &[], day(), &timeline).await.unwrap();

        register(&db, "b2").await;
        let mut invalid = observation("b2");
        invalid.end_ts = invalid.start_ts;
        let result = db
            .commit_batch("b2", &[invalid], day(), &[card("11:00", "11:10", "lost")])
            .await;

        assert!(result.is_err());
        assert_eq!(db.load_timeline(day()).await.unwrap(), timeline);
        assert_eq!(
            db.get_batch("b2").await.unwrap().unwrap().status,
            BatchStatus::Pending
        );
    }

    #[tokio::test]
    async fn days_are_stored_separately() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("timeline.db")).unwrap();
        register(&db, "b1").await;

        db.commit_batch("b1", &[], day(), &[card("10:00", "10:05", "a")])
            .await
            .unwrap();

        let next_day = day().succ_opt().unwrap();
        assert!(db.load_timeline(next_day).await.unwrap().is_empty());
    }
}
