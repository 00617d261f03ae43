pub mod backend;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod timeline;
pub mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tokio_util::sync::CancellationToken;

use backend::{Backend, TextBackend};
use db::Database;
use pipeline::{Pipeline, PipelineConfig};
use settings::{SettingsStore, UserSettings};
use timeline::{BatchOutcome, TimelineRunner};

pub const DATABASE_FILE: &str = "timeline.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Logging for the binary; `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

pub fn open_settings(data_dir: &Path) -> Result<SettingsStore> {
    SettingsStore::new(data_dir.join(SETTINGS_FILE))
}

pub fn open_database(data_dir: &Path) -> Result<Database> {
    Database::new(data_dir.join(DATABASE_FILE))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub screenshots: usize,
    pub batches: usize,
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Group the screenshots in `dir` into batches and run them through the pipeline in order.
pub async fn ingest(
    settings: &UserSettings,
    db: Database,
    dir: &Path,
    cancel: CancellationToken,
) -> Result<IngestSummary> {
    let screenshots = timeline::collect_screenshots(dir)?;
    let mut summary = IngestSummary {
        screenshots: screenshots.len(),
        ..IngestSummary::default()
    };

    let batches = timeline::group_screenshots(screenshots, &settings.batching);
    summary.batches = batches.len();
    info!(
        "Found {} screenshot(s) in {} batch(es) under {}",
        summary.screenshots,
        summary.batches,
        dir.display()
    );

    let backend = Backend::from_settings(&settings.backend).context("failed to configure backend")?;
    info!("Using {} backend ({})", backend.provider(), backend.model_name());

    let pipeline = Pipeline::new(backend, PipelineConfig::from(&settings.pipeline));
    let runner = TimelineRunner::new(pipeline, db, settings.categories.clone());

    for batch in &batches {
        match runner.process_batch(batch, &cancel).await? {
            BatchOutcome::Committed { .. } => summary.committed += 1,
            BatchOutcome::Skipped => summary.skipped += 1,
            BatchOutcome::Failed { .. } => summary.failed += 1,
            BatchOutcome::Cancelled => {
                summary.cancelled = true;
                break;
            }
        }
    }

    Ok(summary)
}
