mod common;

use chrono::NaiveDate;
use common::{categories, write_frames, ScriptedBackend, NOON};
use lefocus_timeline_lib::backend::BackendError;
use lefocus_timeline_lib::db::Database;
use lefocus_timeline_lib::models::{Batch, BatchStatus};
use lefocus_timeline_lib::pipeline::{Pipeline, PipelineConfig};
use lefocus_timeline_lib::timeline::{batch_id, BatchOutcome, TimelineRunner};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

const SEGMENTS: &str = r#"[{"start_offset": 0, "end_offset": 300, "observation": "writing code"}]"#;
const CARD: &str = r#"{"title": "Coding session", "summary": "Wrote code.", "category": "coding"}"#;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn batch(dir: &TempDir, start: i64) -> Batch {
    let times: Vec<i64> = (0..5).map(|i| start + i * 60).collect();
    let screenshots = write_frames(dir.path(), &times);
    Batch {
        id: batch_id(start, start + 240),
        start_ts: start,
        end_ts: start + 240,
        screenshots,
    }
}

fn runner(dir: &TempDir, backend: ScriptedBackend) -> TimelineRunner<ScriptedBackend> {
    let db = Database::new(dir.path().join("timeline.sqlite3")).unwrap();
    TimelineRunner::new(
        Pipeline::new(backend, PipelineConfig::default()),
        db,
        categories(),
    )
}

#[tokio::test]
async fn committed_batch_is_persisted_and_not_reprocessed() {
    let dir = tempdir().unwrap();
    let backend = ScriptedBackend::new("editor")
        .text_reply(SEGMENTS)
        .structured_reply(CARD);
    let runner = runner(&dir, backend);
    let batch = batch(&dir, NOON);
    let cancel = CancellationToken::new();

    let outcome = runner.process_batch(&batch, &cancel).await.unwrap();
    assert_eq!(
        outcome,
        BatchOutcome::Committed {
            observations: 1,
            cards: 1
        }
    );

    let db = runner.database();
    let timeline = db.load_timeline(day()).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].category, "Coding");
    assert_eq!(timeline[0].start_time, "2024-01-01 12:00");
    assert_eq!(timeline[0].end_time, "2024-01-01 12:05");
    assert_eq!(db.observations_for_batch(&batch.id).await.unwrap().len(), 1);
    assert_eq!(
        db.get_batch(&batch.id).await.unwrap().unwrap().status,
        BatchStatus::Analyzed
    );

    let captions = runner.pipeline().backend().captions();
    assert_eq!(
        runner.process_batch(&batch, &cancel).await.unwrap(),
        BatchOutcome::Skipped
    );
    assert_eq!(runner.pipeline().backend().captions(), captions);
}

#[tokio::test]
async fn failed_batch_is_recorded_and_timeline_kept() {
    let dir = tempdir().unwrap();
    let backend = ScriptedBackend::new("editor")
        .text_reply(SEGMENTS)
        .structured_reply(CARD)
        .text_reply(SEGMENTS)
        .structured_error(BackendError::Status {
            status: 503,
            body: "overloaded".into(),
        });
    let runner = runner(&dir, backend);
    let cancel = CancellationToken::new();

    let first = batch(&dir, NOON);
    runner.process_batch(&first, &cancel).await.unwrap();
    let before = runner.database().load_timeline(day()).await.unwrap();

    let second = batch(&dir, NOON + 600);
    match runner.process_batch(&second, &cancel).await.unwrap() {
        BatchOutcome::Failed { reason } => assert!(reason.contains("503"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }

    let db = runner.database();
    assert_eq!(db.load_timeline(day()).await.unwrap(), before);
    assert!(db.observations_for_batch(&second.id).await.unwrap().is_empty());
    let record = db.get_batch(&second.id).await.unwrap().unwrap();
    assert_eq!(record.status, BatchStatus::Failed);
}

#[tokio::test]
async fn batch_without_captions_fails() {
    let dir = tempdir().unwrap();
    let runner = runner(&dir, ScriptedBackend::failing_captions());
    let batch = batch(&dir, NOON);

    let outcome = runner
        .process_batch(&batch, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        BatchOutcome::Failed {
            reason: "no frames described".into()
        }
    );
    assert!(runner.database().load_timeline(day()).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_batch_writes_nothing() {
    let dir = tempdir().unwrap();
    let backend = ScriptedBackend::new("editor")
        .text_reply(SEGMENTS)
        .structured_reply(CARD);
    let runner = runner(&dir, backend);
    let batch = batch(&dir, NOON);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = runner.process_batch(&batch, &cancel).await.unwrap();
    assert_eq!(outcome, BatchOutcome::Cancelled);

    let db = runner.database();
    assert!(db.load_timeline(day()).await.unwrap().is_empty());
    assert_eq!(
        db.get_batch(&batch.id).await.unwrap().unwrap().status,
        BatchStatus::Pending
    );

    // A later run picks the batch up again.
    let outcome = runner
        .process_batch(&batch, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, BatchOutcome::Committed { .. }));
}
