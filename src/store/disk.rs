use super::{SaveReport, SaveStats, SaveStatus, megabytes};
use crate::core::fetch::{DateBatch, Outcome};
use crate::core::orchestrator::{RunResult, RunStatus};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Creates `{base_dir}/{date}` if it is missing.
pub fn ensure_date_directory(date: &str, base_dir: &Path) -> io::Result<PathBuf> {
    let dir = base_dir.join(date);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes `data` to `filepath` in one go. Failures are logged, not returned.
pub fn save_result(data: &[u8], filepath: &Path) -> bool {
    match fs::write(filepath, data) {
        Ok(()) => {
            let name = filepath
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(
                "Saved {} ({:.1} MB)",
                name,
                megabytes(data.len() as u64)
            );
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to save {}", filepath.display());
            false
        }
    }
}

pub fn csv_filename(filename: &str, date: &str) -> String {
    format!("{filename}-{date}.csv")
}

/// Saves every successful result of one date. Failed and empty results count as errors.
pub fn save_date_batch(batch: &DateBatch, base_dir: &Path) -> SaveStats {
    let date = batch.date.as_str();
    info!(%date, "Saving results");

    let directory = match ensure_date_directory(date, base_dir) {
        Ok(dir) => dir,
        Err(e) => {
            error!(%date, error = %e, "Failed to create date directory");
            return SaveStats {
                date: date.to_string(),
                saved: 0,
                errors: batch.results.len(),
                directory: base_dir.join(date),
            };
        }
    };

    let mut saved = 0;
    let mut errors = 0;

    for result in &batch.results {
        let payload = match &result.outcome {
            Outcome::Success(payload) => payload,
            Outcome::Error { .. } => {
                errors += 1;
                continue;
            }
        };

        if payload.is_empty() {
            warn!(%date, source = %result.source, "Empty payload, not saving");
            errors += 1;
            continue;
        }

        let filepath = directory.join(csv_filename(&result.target_filename(), date));
        if save_result(payload.as_bytes(), &filepath) {
            saved += 1;
        } else {
            errors += 1;
        }
    }

    info!(%date, "{} saved, {} errors", saved, errors);
    SaveStats {
        date: date.to_string(),
        saved,
        errors,
        directory,
    }
}

/// Saves a completed run; any other run status yields an error report.
pub fn save_run(run: &RunResult, base_dir: &Path) -> SaveReport {
    info!("Saving results to {}", base_dir.display());

    if run.status != RunStatus::Completed {
        error!(status = ?run.status, "Scrape did not complete");
        let message = match &run.error {
            Some(e) => format!("Scrape did not complete: {e}"),
            None => format!("Scrape did not complete ({:?})", run.status),
        };
        return SaveReport::empty(SaveStatus::Error, Some(message));
    }

    if run.batches.is_empty() {
        warn!("No results to save");
        return SaveReport::empty(SaveStatus::NoData, None);
    }

    let details: Vec<SaveStats> = run
        .batches
        .iter()
        .map(|batch| save_date_batch(batch, base_dir))
        .collect();

    let total_saved = details.iter().map(|s| s.saved).sum();
    let total_errors = details.iter().map(|s| s.errors).sum();
    let directories: Vec<PathBuf> = details.iter().map(|s| s.directory.clone()).collect();

    info!(
        "Save finished: {} dates, {} files, {} errors",
        details.len(),
        total_saved,
        total_errors
    );

    SaveReport {
        status: SaveStatus::Completed,
        message: None,
        dates_processed: details.len(),
        total_saved,
        total_errors,
        directories,
        details,
    }
}

/// Replaces the filename of every result whose source is in `mapping`, then saves.
pub fn save_with_custom_mapping(
    mut run: RunResult,
    mapping: &HashMap<String, String>,
    base_dir: &Path,
) -> SaveReport {
    info!(?mapping, "Saving with custom filenames");

    for result in run.batches.iter_mut().flat_map(|b| b.results.iter_mut()) {
        if let Some(filename) = mapping.get(&result.source) {
            result.filename = Some(filename.clone());
        }
    }

    save_run(&run, base_dir)
}
