use super::ui;
use crate::store::{self, Inventory};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment};
use std::path::Path;

impl Inventory {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell("Files"),
            ui::header_cell("Size (MB)"),
            ui::header_cell("Filenames"),
        ]);

        for date in &self.dates {
            table.add_row(vec![
                Cell::new(&date.date),
                ui::count_cell(date.files, false),
                Cell::new(format!("{:.1}", date.total_size_mb))
                    .set_alignment(CellAlignment::Right),
                Cell::new(date.filenames.join("\n")),
            ]);
        }

        let mut output = table.to_string();
        output.push_str(&format!(
            "\n\n{}: {} directories, {} files",
            ui::style_text("Total", ui::StyleType::TotalLabel),
            self.directories,
            ui::style_text(&self.total_files.to_string(), ui::StyleType::TotalValue)
        ));
        output
    }
}

pub fn list(base_dir: &Path, json: bool) -> Result<()> {
    let inventory = store::list_saved_files(base_dir)
        .with_context(|| format!("Failed to list files under {}", base_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else if inventory.directories == 0 {
        println!("No saved files under {}.", base_dir.display());
    } else {
        println!("{}", inventory.display_as_table());
    }
    Ok(())
}

pub fn cleanup(base_dir: &Path, keep_days: u64) -> Result<()> {
    let stats = store::cleanup_old_files(base_dir, keep_days)
        .with_context(|| format!("Failed to clean up {}", base_dir.display()))?;

    println!(
        "Removed {} directories, kept {}.",
        ui::style_text(&stats.removed.to_string(), ui::StyleType::TotalValue),
        stats.kept
    );
    if stats.failed > 0 {
        println!(
            "{} directories could not be removed.",
            ui::style_text(&stats.failed.to_string(), ui::StyleType::Error)
        );
    }
    Ok(())
}
