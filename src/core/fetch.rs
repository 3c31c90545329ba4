//! Fetch abstractions and the per-adapter result types

use crate::core::session::Session;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Normalized body returned by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// Coarse category attached to every failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Transport,
    Payload,
    Unexpected,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ErrorKind::Transport => "transport",
                ErrorKind::Payload => "payload",
                ErrorKind::Unexpected => "unexpected",
            }
        )
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Connection pool closed: {0}")]
    PoolClosed(#[from] tokio::sync::AcquireError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to read archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Payload(String),

    #[error("Adapter panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_) | FetchError::PoolClosed(_) | FetchError::Timeout(_) => {
                ErrorKind::Transport
            }
            FetchError::Json(_)
            | FetchError::Archive(_)
            | FetchError::Io(_)
            | FetchError::Payload(_) => ErrorKind::Payload,
            FetchError::Panicked(_) => ErrorKind::Unexpected,
        }
    }
}

/// One network interaction pattern for one data category.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, session: &Session, date: &str) -> Result<Payload, FetchError>;
}

/// Lists the raw workday strings published upstream, boundary entries included.
#[async_trait]
pub trait DateSource: Send + Sync {
    async fn available_dates(&self, session: &Session) -> Result<Vec<String>, FetchError>;
}

/// A configured entry of the source table.
#[derive(Clone)]
pub struct Source {
    pub name: String,
    pub filename: Option<String>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl Source {
    pub fn new(name: &str, filename: Option<&str>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            name: name.to_string(),
            filename: filename.map(str::to_string),
            fetcher,
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Payload),
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source: String,
    pub filename: Option<String>,
    pub date: String,
    pub outcome: Outcome,
}

impl FetchResult {
    pub fn success(source: &Source, date: &str, payload: Payload) -> Self {
        Self {
            source: source.name.clone(),
            filename: source.filename.clone(),
            date: date.to_string(),
            outcome: Outcome::Success(payload),
        }
    }

    pub fn failure(source: &Source, date: &str, error: &FetchError) -> Self {
        Self {
            source: source.name.clone(),
            filename: source.filename.clone(),
            date: date.to_string(),
            outcome: Outcome::Error {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn status(&self) -> FetchStatus {
        match self.outcome {
            Outcome::Success(_) => FetchStatus::Success,
            Outcome::Error { .. } => FetchStatus::Error,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            Outcome::Success(payload) => Some(payload),
            Outcome::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Error { message, .. } => Some(message),
        }
    }

    /// Configured filename, or the source name lower-cased with spaces as underscores.
    pub fn target_filename(&self) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| default_filename(&self.source))
    }
}

pub fn default_filename(source_name: &str) -> String {
    source_name.to_lowercase().replace(' ', "_")
}

/// Per-adapter outcomes for one date, in source table order.
#[derive(Debug, Clone)]
pub struct DateBatch {
    pub date: String,
    pub results: Vec<FetchResult>,
}

impl DateBatch {
    pub fn success_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status() == FetchStatus::Success)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}
