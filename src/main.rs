use anyhow::Result;
use b3scrape::core::log::init_logging;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Download the latest business dates and save them as CSV files
    Fetch {
        /// Number of most recent business dates to fetch
        #[arg(short, long)]
        max_dates: Option<usize>,
        /// Base directory for the date folders
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved files per date
    List {
        /// Base directory for the date folders
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove date folders older than the retention window
    Cleanup {
        /// Base directory for the date folders
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
        /// Number of days to keep
        #[arg(short, long, default_value_t = 30)]
        keep_days: u64,
    },
}

impl From<Commands> for b3scrape::AppCommand {
    fn from(cmd: Commands) -> b3scrape::AppCommand {
        match cmd {
            Commands::Fetch {
                max_dates,
                base_dir,
                json,
            } => b3scrape::AppCommand::Fetch {
                max_dates,
                base_dir,
                json,
            },
            Commands::List { base_dir, json } => b3scrape::AppCommand::List { base_dir, json },
            Commands::Cleanup {
                base_dir,
                keep_days,
            } => b3scrape::AppCommand::Cleanup {
                base_dir,
                keep_days,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Setup => b3scrape::cli::setup::setup(),
        cmd => b3scrape::run_command(cmd.into(), cli.config_path.as_deref()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
