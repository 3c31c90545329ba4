pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::fetch::{ErrorKind, Outcome};
use crate::core::{Orchestrator, RunStatus, RunSummary};
use crate::store::SaveReport;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum AppCommand {
    Fetch {
        max_dates: Option<usize>,
        base_dir: Option<PathBuf>,
        json: bool,
    },
    List {
        base_dir: Option<PathBuf>,
        json: bool,
    },
    Cleanup {
        base_dir: Option<PathBuf>,
        keep_days: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFetch {
    pub date: String,
    pub source: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one fetch-and-save run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summary: RunSummary,
    pub failures: Vec<FailedFetch>,
    pub save: SaveReport,
}

/// Fetches every configured source for up to `max_dates` business dates and
/// writes the results under `base_dir`.
pub async fn run_and_save(
    config: &AppConfig,
    max_dates: usize,
    base_dir: &Path,
    on_fetched: &(dyn Fn() + Sync),
) -> RunReport {
    let sources = providers::build_sources(&config.sources);
    let dates = providers::WorkdaysProvider;

    let run = Orchestrator::new(&config.base_url, &config.http, &dates, &sources)
        .run(max_dates, on_fetched)
        .await;

    let failures = run
        .batches
        .iter()
        .flat_map(|b| &b.results)
        .filter_map(|r| match &r.outcome {
            Outcome::Error { kind, message } => Some(FailedFetch {
                date: r.date.clone(),
                source: r.source.clone(),
                kind: *kind,
                message: message.clone(),
            }),
            Outcome::Success(_) => None,
        })
        .collect();

    let status = run.status;
    let error = run.error.clone();
    let summary = run.summary;

    let save = if config.filename_overrides.is_empty() {
        store::save_run(&run, base_dir)
    } else {
        store::save_with_custom_mapping(run, &config.filename_overrides, base_dir)
    };
    info!("Run finished");

    RunReport {
        status,
        error,
        summary,
        failures,
        save,
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("b3scrape starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let default_base = PathBuf::from(&config.data_path);
    match command {
        AppCommand::Fetch {
            max_dates,
            base_dir,
            json,
        } => {
            let max_dates = max_dates.unwrap_or(config.max_dates);
            let base_dir = base_dir.unwrap_or(default_base);
            cli::fetch::run(&config, max_dates, &base_dir, json).await
        }
        AppCommand::List { base_dir, json } => {
            cli::files::list(&base_dir.unwrap_or(default_base), json)
        }
        AppCommand::Cleanup {
            base_dir,
            keep_days,
        } => cli::files::cleanup(&base_dir.unwrap_or(default_base), keep_days),
    }
}
