//! Fans the source table out over every available business date

use crate::core::config::HttpConfig;
use crate::core::fetch::{DateBatch, DateSource, FetchError, FetchResult, Source};
use crate::core::session::Session;
use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoDates,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_success: usize,
    pub total_errors: usize,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub error: Option<String>,
    pub batches: Vec<DateBatch>,
    pub summary: RunSummary,
}

impl RunResult {
    pub fn completed(batches: Vec<DateBatch>) -> Self {
        let summary = RunSummary {
            total_success: batches.iter().map(DateBatch::success_count).sum(),
            total_errors: batches.iter().map(DateBatch::error_count).sum(),
        };
        Self {
            status: RunStatus::Completed,
            error: None,
            batches,
            summary,
        }
    }

    pub fn no_dates() -> Self {
        Self {
            status: RunStatus::NoDates,
            error: None,
            batches: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message),
            batches: Vec::new(),
            summary: RunSummary::default(),
        }
    }
}

/// Drops the boundary sentinels, trims each entry to its date and keeps at most `max_dates`.
///
/// Entries that are not a `YYYY-MM-DD` calendar date are skipped.
pub fn business_dates(raw: &[String], max_dates: usize) -> Vec<String> {
    if raw.len() < 2 {
        return Vec::new();
    }
    raw[1..raw.len() - 1]
        .iter()
        .filter_map(|entry| {
            let trimmed: String = entry.chars().take(10).collect();
            match NaiveDate::parse_from_str(&trimmed, "%Y-%m-%d") {
                Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
                Err(_) => {
                    warn!(entry = %entry, "Skipping workday that is not a date");
                    None
                }
            }
        })
        .take(max_dates)
        .collect()
}

pub struct Orchestrator<'a> {
    base_url: &'a str,
    http: &'a HttpConfig,
    dates: &'a dyn DateSource,
    sources: &'a [Source],
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        base_url: &'a str,
        http: &'a HttpConfig,
        dates: &'a dyn DateSource,
        sources: &'a [Source],
    ) -> Self {
        Self {
            base_url,
            http,
            dates,
            sources,
        }
    }

    /// Runs every source for up to `max_dates` business dates.
    ///
    /// `on_fetched` is called once per finished adapter invocation.
    pub async fn run(&self, max_dates: usize, on_fetched: &(dyn Fn() + Sync)) -> RunResult {
        info!("Starting scrape for up to {} dates", max_dates);

        // Dropped on every return path below, releasing the pool.
        let session = match Session::new(self.base_url, self.http) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to open HTTP session");
                return RunResult::failed(e.to_string());
            }
        };

        let raw_dates = match self.dates.available_dates(&session).await {
            Ok(dates) => dates,
            Err(e) => {
                error!(error = %e, "Failed to get available dates");
                return RunResult::failed(e.to_string());
            }
        };

        let dates = business_dates(&raw_dates, max_dates);
        if dates.is_empty() {
            warn!("No business dates available");
            return RunResult::no_dates();
        }
        info!("Processing {} dates", dates.len());

        let batches = join_all(
            dates
                .iter()
                .map(|date| self.run_date(&session, date, on_fetched)),
        )
        .await;

        let result = RunResult::completed(batches);
        info!(
            "Run summary: {} successes, {} errors across {} dates",
            result.summary.total_success,
            result.summary.total_errors,
            result.batches.len()
        );
        result
    }

    #[instrument(skip(self, session, on_fetched))]
    async fn run_date(
        &self,
        session: &Session,
        date: &str,
        on_fetched: &(dyn Fn() + Sync),
    ) -> DateBatch {
        info!("Starting sources");
        let results = join_all(self.sources.iter().map(|source| async move {
            let result = self.run_source(session, source, date).await;
            on_fetched();
            result
        }))
        .await;
        info!("Finished sources");

        DateBatch {
            date: date.to_string(),
            results,
        }
    }

    async fn run_source(&self, session: &Session, source: &Source, date: &str) -> FetchResult {
        let timeout = Duration::from_secs(self.http.adapter_timeout_secs);
        info!(source = %source.name, "Fetching");

        let attempt = AssertUnwindSafe(source.fetcher.fetch(session, date)).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(FetchError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        match outcome {
            Ok(payload) => {
                info!(source = %source.name, bytes = payload.len(), "Fetched");
                FetchResult::success(source, date, payload)
            }
            Err(e) => {
                error!(source = %source.name, kind = %e.kind(), error = %e, "Fetch failed");
                FetchResult::failure(source, date, &e)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fetch::{ErrorKind, FetchStatus, Fetcher, Outcome, Payload};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDates(Vec<&'static str>);

    #[async_trait]
    impl DateSource for FixedDates {
        async fn available_dates(&self, _session: &Session) -> Result<Vec<String>, FetchError> {
            Ok(self.0.iter().map(|d| d.to_string()).collect())
        }
    }

    struct BrokenDates;

    #[async_trait]
    impl DateSource for BrokenDates {
        async fn available_dates(&self, _session: &Session) -> Result<Vec<String>, FetchError> {
            Err(FetchError::Payload("workdays unavailable".to_string()))
        }
    }

    struct EchoFetcher {
        delay_ms: u64,
    }

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, _session: &Session, date: &str) -> Result<Payload, FetchError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(Payload::Text(format!("date\n{date}\n")))
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, _session: &Session, _date: &str) -> Result<Payload, FetchError> {
            Err(FetchError::Payload("Missing download token".to_string()))
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        async fn fetch(&self, _session: &Session, _date: &str) -> Result<Payload, FetchError> {
            panic!("index out of bounds");
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl Fetcher for HangingFetcher {
        async fn fetch(&self, _session: &Session, _date: &str) -> Result<Payload, FetchError> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    const RAW_DATES: [&str; 5] = [
        "2024-09-23T00:00:00",
        "2024-09-20T00:00:00",
        "2024-09-19T00:00:00",
        "2024-09-18T00:00:00",
        "2024-09-13T00:00:00",
    ];

    async fn run_with(
        dates: &dyn DateSource,
        sources: &[Source],
        http: &HttpConfig,
        max_dates: usize,
    ) -> RunResult {
        Orchestrator::new("http://127.0.0.1:9", http, dates, sources)
            .run(max_dates, &|| {})
            .await
    }

    #[test]
    fn test_business_dates_drops_boundaries_then_truncates() {
        let raw: Vec<String> = RAW_DATES.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            business_dates(&raw, 7),
            vec!["2024-09-20", "2024-09-19", "2024-09-18"]
        );
        assert_eq!(business_dates(&raw, 2), vec!["2024-09-20", "2024-09-19"]);
        assert!(business_dates(&raw, 0).is_empty());
        assert!(business_dates(&raw[..2], 7).is_empty());
        assert!(business_dates(&raw[..1], 7).is_empty());
        assert!(business_dates(&[], 7).is_empty());
    }

    #[test]
    fn test_business_dates_skips_entries_that_are_not_dates() {
        let raw: Vec<String> = [
            "2024-09-23T00:00:00",
            "../escaped",
            "2024-09-20T00:00:00",
            "2024-13-01T00:00:00",
            "",
            "2024-09-19",
            "2024-09-18T00:00:00",
            "2024-09-13T00:00:00",
        ]
        .iter()
        .map(|d| d.to_string())
        .collect();

        assert_eq!(
            business_dates(&raw, 7),
            vec!["2024-09-20", "2024-09-19", "2024-09-18"]
        );
        assert_eq!(business_dates(&raw, 1), vec!["2024-09-20"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_workdays_never_reach_the_disk() {
        let sources = vec![Source::new("Echo", None, Arc::new(EchoFetcher { delay_ms: 0 }))];
        let dates = FixedDates(vec!["s", "../escaped", "e"]);
        let result = run_with(&dates, &sources, &HttpConfig::default(), 7).await;

        assert_eq!(result.status, RunStatus::NoDates);
        assert!(result.batches.is_empty());

        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("data");
        let report = crate::store::save_run(&result, &base);
        assert!(report.directories.is_empty());
        assert!(!dir.path().join("escaped").exists());
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_source_and_date() {
        let sources = vec![
            Source::new("Echo", Some("echo"), Arc::new(EchoFetcher { delay_ms: 20 })),
            Source::new("Broken", None, Arc::new(FailingFetcher)),
            Source::new("Panicky", None, Arc::new(PanickingFetcher)),
            Source::new("Fast echo", None, Arc::new(EchoFetcher { delay_ms: 0 })),
        ];
        let result = run_with(
            &FixedDates(RAW_DATES.to_vec()),
            &sources,
            &HttpConfig::default(),
            7,
        )
        .await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.batches.len(), 3);
        assert_eq!(result.summary.total_success, 6);
        assert_eq!(result.summary.total_errors, 6);

        for (batch, date) in result
            .batches
            .iter()
            .zip(["2024-09-20", "2024-09-19", "2024-09-18"])
        {
            assert_eq!(batch.date, date);
            let names: Vec<_> = batch.results.iter().map(|r| r.source.as_str()).collect();
            assert_eq!(names, vec!["Echo", "Broken", "Panicky", "Fast echo"]);

            assert_eq!(
                batch.results[0].payload(),
                Some(&Payload::Text(format!("date\n{date}\n")))
            );
            assert_eq!(batch.results[1].status(), FetchStatus::Error);
            assert_eq!(
                batch.results[1].error_message(),
                Some("Missing download token")
            );
            match &batch.results[2].outcome {
                Outcome::Error { kind, message } => {
                    assert_eq!(*kind, ErrorKind::Unexpected);
                    assert!(message.contains("index out of bounds"));
                }
                other => panic!("Expected panic to become an error, got {other:?}"),
            }
            assert_eq!(batch.results[3].status(), FetchStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_hanging_adapter_times_out() {
        let http = HttpConfig {
            adapter_timeout_secs: 1,
            ..HttpConfig::default()
        };
        let sources = vec![
            Source::new("Hangs", None, Arc::new(HangingFetcher)),
            Source::new("Echo", None, Arc::new(EchoFetcher { delay_ms: 0 })),
        ];
        let result = run_with(&FixedDates(RAW_DATES.to_vec()), &sources, &http, 1).await;

        assert_eq!(result.status, RunStatus::Completed);
        let batch = &result.batches[0];
        assert!(matches!(
            batch.results[0].outcome,
            Outcome::Error {
                kind: ErrorKind::Transport,
                ..
            }
        ));
        assert!(batch.results[0].error_message().unwrap().contains("Timed out"));
        assert_eq!(batch.results[1].status(), FetchStatus::Success);
    }

    #[tokio::test]
    async fn test_date_failure_aborts_run() {
        let sources = vec![Source::new("Echo", None, Arc::new(EchoFetcher { delay_ms: 0 }))];
        let result = run_with(&BrokenDates, &sources, &HttpConfig::default(), 7).await;

        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error.as_deref(), Some("workdays unavailable"));
        assert!(result.batches.is_empty());
    }

    #[tokio::test]
    async fn test_only_sentinels_means_no_dates() {
        let sources = vec![Source::new("Echo", None, Arc::new(EchoFetcher { delay_ms: 0 }))];
        let dates = FixedDates(vec!["2024-09-23T00:00:00", "2024-09-13T00:00:00"]);
        let result = run_with(&dates, &sources, &HttpConfig::default(), 7).await;

        assert_eq!(result.status, RunStatus::NoDates);
        assert_eq!(result.summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_progress_callback_fires_per_fetch() {
        let sources = vec![
            Source::new("Echo", None, Arc::new(EchoFetcher { delay_ms: 0 })),
            Source::new("Broken", None, Arc::new(FailingFetcher)),
        ];
        let dates = FixedDates(RAW_DATES.to_vec());
        let http = HttpConfig::default();
        let counter = AtomicUsize::new(0);

        let result = Orchestrator::new("http://127.0.0.1:9", &http, &dates, &sources)
            .run(2, &|| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(result.batches.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_dates_run_concurrently() {
        let sources = vec![Source::new(
            "Slow",
            None,
            Arc::new(EchoFetcher { delay_ms: 200 }),
        )];
        let started = std::time::Instant::now();
        let result = run_with(
            &FixedDates(RAW_DATES.to_vec()),
            &sources,
            &HttpConfig::default(),
            3,
        )
        .await;

        assert_eq!(result.summary.total_success, 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }
}
