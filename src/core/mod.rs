//! Core scraping abstractions

pub mod config;
pub mod fetch;
pub mod format;
pub mod log;
pub mod orchestrator;
pub mod session;

// Re-export main types for cleaner imports
pub use fetch::{DateBatch, DateSource, FetchError, FetchResult, Fetcher, Payload, Source};
pub use orchestrator::{Orchestrator, RunResult, RunStatus, RunSummary};
pub use session::Session;
