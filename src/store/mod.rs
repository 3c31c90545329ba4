//! Date-partitioned CSV file tree: `{base_dir}/{date}/{filename}-{date}.csv`

pub mod disk;
pub mod inventory;

use serde::Serialize;
use std::path::PathBuf;

pub use disk::{
    ensure_date_directory, save_date_batch, save_result, save_run, save_with_custom_mapping,
};
pub use inventory::{cleanup_old_files, cleanup_old_files_at, list_saved_files};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveStats {
    pub date: String,
    pub saved: usize,
    pub errors: usize,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Completed,
    NoData,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub status: SaveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub dates_processed: usize,
    pub total_saved: usize,
    pub total_errors: usize,
    pub directories: Vec<PathBuf>,
    pub details: Vec<SaveStats>,
}

impl SaveReport {
    fn empty(status: SaveStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            dates_processed: 0,
            total_saved: 0,
            total_errors: 0,
            directories: Vec::new(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateInventory {
    pub date: String,
    pub files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub filenames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub directories: usize,
    pub total_files: usize,
    pub dates: Vec<DateInventory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub removed: usize,
    pub kept: usize,
    /// Expired directories that could not be removed.
    pub failed: usize,
}

pub(crate) fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
