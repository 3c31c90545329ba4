use super::ui;
use crate::core::RunStatus;
use crate::core::config::AppConfig;
use crate::{RunReport, run_and_save};
use anyhow::{Result, bail};
use comfy_table::Cell;
use std::path::Path;
use std::time::Duration;

impl RunReport {
    pub fn display_as_table(&self) -> String {
        let mut output = format!(
            "Run: {}\n\n",
            ui::style_text(&format!("{:?}", self.status), ui::StyleType::Title)
        );

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell("Saved"),
            ui::header_cell("Errors"),
            ui::header_cell("Directory"),
        ]);
        for stats in &self.save.details {
            table.add_row(vec![
                Cell::new(&stats.date),
                ui::count_cell(stats.saved, false),
                ui::count_cell(stats.errors, true),
                Cell::new(stats.directory.display()),
            ]);
        }
        output.push_str(&table.to_string());

        if !self.failures.is_empty() {
            let mut failures = ui::new_styled_table();
            failures.set_header(vec![
                ui::header_cell("Date"),
                ui::header_cell("Source"),
                ui::header_cell("Kind"),
                ui::header_cell("Error"),
            ]);
            for failure in &self.failures {
                failures.add_row(vec![
                    Cell::new(&failure.date),
                    Cell::new(&failure.source),
                    Cell::new(failure.kind),
                    Cell::new(&failure.message),
                ]);
            }
            output.push_str("\n\nFailed fetches\n\n");
            output.push_str(&failures.to_string());
        }

        output.push_str(&format!(
            "\n\n{}: {} dates, {} files saved, {}",
            ui::style_text("Total", ui::StyleType::TotalLabel),
            self.save.dates_processed,
            ui::style_text(&self.save.total_saved.to_string(), ui::StyleType::TotalValue),
            ui::style_text(
                &format!("{} errors", self.save.total_errors),
                if self.save.total_errors > 0 {
                    ui::StyleType::Error
                } else {
                    ui::StyleType::Subtle
                }
            )
        ));

        output
    }
}

pub async fn run(config: &AppConfig, max_dates: usize, base_dir: &Path, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Fetching B3 files...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let report = run_and_save(config, max_dates, base_dir, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report.status {
            RunStatus::Completed => println!("{}", report.display_as_table()),
            RunStatus::NoDates => println!("No business dates available."),
            RunStatus::Error => {}
        }
    }

    if report.status == RunStatus::Error {
        bail!(
            "Scrape failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
