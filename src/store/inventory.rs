use super::{CleanupStats, DateInventory, Inventory, megabytes};
use chrono::{Days, Local, NaiveDate};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error, info};

/// Lists every date directory under `base_dir` with its CSV files, newest first.
pub fn list_saved_files(base_dir: &Path) -> io::Result<Inventory> {
    if !base_dir.exists() {
        return Ok(Inventory::default());
    }

    let mut dates = Vec::new();
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let mut filenames = Vec::new();
        let mut total_size_bytes = 0;
        for file in fs::read_dir(entry.path())? {
            let file = file?;
            let path = file.path();
            if path.extension().is_some_and(|ext| ext == "csv") && file.file_type()?.is_file() {
                total_size_bytes += file.metadata()?.len();
                filenames.push(file.file_name().to_string_lossy().into_owned());
            }
        }
        filenames.sort();

        dates.push(DateInventory {
            date: entry.file_name().to_string_lossy().into_owned(),
            files: filenames.len(),
            total_size_bytes,
            total_size_mb: (megabytes(total_size_bytes) * 10.0).round() / 10.0,
            filenames,
        });
    }

    dates.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(Inventory {
        directories: dates.len(),
        total_files: dates.iter().map(|d| d.files).sum(),
        dates,
    })
}

/// Removes date directories older than `keep_days` days before today.
pub fn cleanup_old_files(base_dir: &Path, keep_days: u64) -> io::Result<CleanupStats> {
    cleanup_old_files_at(base_dir, keep_days, Local::now().date_naive())
}

/// Removes date directories strictly older than `today - keep_days`.
///
/// Directories whose name is not a `YYYY-MM-DD` date are left alone and counted as kept.
pub fn cleanup_old_files_at(
    base_dir: &Path,
    keep_days: u64,
    today: NaiveDate,
) -> io::Result<CleanupStats> {
    cleanup_with(base_dir, keep_days, today, |path| fs::remove_dir_all(path))
}

// A failed removal is logged and counted; the remaining directories are still processed.
fn cleanup_with<F>(
    base_dir: &Path,
    keep_days: u64,
    today: NaiveDate,
    remove: F,
) -> io::Result<CleanupStats>
where
    F: Fn(&Path) -> io::Result<()>,
{
    let mut stats = CleanupStats::default();
    if !base_dir.exists() {
        return Ok(stats);
    }

    let cutoff = today
        .checked_sub_days(Days::new(keep_days))
        .unwrap_or(NaiveDate::MIN);

    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        match NaiveDate::parse_from_str(&name, "%Y-%m-%d") {
            Ok(date) if date < cutoff => match remove(&entry.path()) {
                Ok(()) => {
                    info!("Removed old directory: {}", name);
                    stats.removed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Failed to remove directory: {}", name);
                    stats.failed += 1;
                }
            },
            Ok(_) => stats.kept += 1,
            Err(_) => {
                debug!("Skipping non-date directory: {}", name);
                stats.kept += 1;
            }
        }
    }

    Ok(stats)
}
