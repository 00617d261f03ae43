use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use lefocus_timeline_lib as app;

#[derive(Parser, Debug)]
#[command(name = "lefocus-timeline")]
#[command(version, about = "Turn screenshot folders into an activity timeline", long_about = None)]
struct Cli {
    /// Directory holding the database and settings.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Batch the screenshots in DIR and fold them into the timeline
    Ingest { dir: PathBuf },
    /// Print the stored timeline as JSON
    Timeline {
        /// Day to print (YYYY-MM-DD), today by default
        #[arg(long)]
        day: Option<NaiveDate>,
    },
    /// Write settings.json if missing, or print the effective settings
    Config {
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    app::init_logging();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(app::settings::data_dir);
    let settings = app::open_settings(&data_dir)?;

    match cli.command {
        Command::Ingest { dir } => {
            let db = app::open_database(&data_dir)?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; abandoning the current batch");
                    on_interrupt.cancel();
                }
            });

            let summary = app::ingest(&settings.effective(), db, &dir, cancel).await?;
            println!(
                "{} screenshot(s), {} batch(es): {} committed, {} skipped, {} failed{}",
                summary.screenshots,
                summary.batches,
                summary.committed,
                summary.skipped,
                summary.failed,
                if summary.cancelled { " (cancelled)" } else { "" }
            );
        }
        Command::Timeline { day } => {
            let db = app::open_database(&data_dir)?;
            let day = day.unwrap_or_else(|| Local::now().date_naive());
            let cards = db.load_timeline(day).await?;
            let rendered =
                serde_json::to_string_pretty(&cards).context("failed to render timeline")?;
            println!("{rendered}");
        }
        Command::Config { show } => {
            if show {
                let rendered = serde_json::to_string_pretty(&settings.effective().redacted())
                    .context("failed to render settings")?;
                println!("{rendered}");
            } else {
                let path = data_dir.join(app::SETTINGS_FILE);
                if path.exists() {
                    println!("Settings already at {}", path.display());
                } else {
                    settings.update(settings.snapshot())?;
                    info!("Wrote default settings");
                    println!("Settings written to {}", path.display());
                }
            }
        }
    }

    Ok(())
}
