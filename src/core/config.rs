use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://arquivos.b3.com.br";

/// Data categories published by the exchange. Each maps to one adapter.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Series,
    Earnings,
    OpenInterest,
    ConsolidatedTrades,
    DailyTrades,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub filename: Option<String>,
}

impl SourceConfig {
    fn new(name: &str, kind: SourceKind, filename: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            filename: Some(filename.to_string()),
        }
    }
}

pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("Series", SourceKind::Series, "series"),
        SourceConfig::new("Earnings", SourceKind::Earnings, "earnings"),
        SourceConfig::new("Open interest", SourceKind::OpenInterest, "open_interest"),
        SourceConfig::new(
            "Consolidated trades",
            SourceKind::ConsolidatedTrades,
            "consolidated_trades_info",
        ),
        SourceConfig::new("Daily trades", SourceKind::DailyTrades, "daily_trades"),
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub max_connections: usize,
    pub max_connections_per_host: usize,
    /// Per-request ceiling for every call except the trades archive.
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Ceiling for one whole adapter invocation, all of its round trips included.
    pub adapter_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            max_connections: 20,
            max_connections_per_host: 10,
            timeout_secs: 60,
            download_timeout_secs: 600,
            adapter_timeout_secs: 900,
            user_agent: "b3scrape/0.1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub data_path: String,
    pub max_dates: usize,
    pub http: HttpConfig,
    pub sources: Vec<SourceConfig>,
    pub filename_overrides: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_path: "data".to_string(),
            max_dates: 7,
            http: HttpConfig::default(),
            sources: default_sources(),
            filename_overrides: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("br", "b3scrape", "b3scrape")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
