use crate::models::{Batch, Screenshot};
use crate::settings::BatchingSettings;

/// Stable id derived from the batch bounds, so re-ingesting the same captures
/// finds the batch that was already recorded.
pub fn batch_id(start_ts: i64, end_ts: i64) -> String {
    format!("batch-{start_ts}-{end_ts}")
}

/// Split captures into batches of consecutive screenshots.
///
/// A screenshot joins the current batch while its distance to the previous
/// capture is at most `max_gap_secs` and it falls within `batch_window_secs`
/// of the batch's first capture.
pub fn group_screenshots(mut screenshots: Vec<Screenshot>, settings: &BatchingSettings) -> Vec<Batch> {
    screenshots.sort_by_key(|shot| shot.captured_at);

    let mut batches = Vec::new();
    let mut current: Option<Batch> = None;

    for shot in screenshots {
        match &mut current {
            Some(batch)
                if shot.captured_at - batch.end_ts <= settings.max_gap_secs
                    && shot.captured_at - batch.start_ts < settings.batch_window_secs =>
            {
                batch.end_ts = shot.captured_at;
                batch.screenshots.push(shot);
            }
            _ => {
                if let Some(batch) = current.take() {
                    batches.push(batch);
                }
                current = Some(Batch {
                    id: String::new(),
                    start_ts: shot.captured_at,
                    end_ts: shot.captured_at,
                    screenshots: vec![shot],
                });
            }
        }
    }

    if let Some(batch) = current {
        batches.push(batch);
    }

    for batch in &mut batches {
        batch.id = batch_id(batch.start_ts, batch.end_ts);
    }
    batches
}
