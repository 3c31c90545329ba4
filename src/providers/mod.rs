pub mod b3;

use crate::core::config::{SourceConfig, SourceKind};
use crate::core::fetch::{Fetcher, Source};
use b3::{DailyTradesProvider, EarningsProvider, TokenFileProvider};
use std::sync::Arc;

pub use b3::WorkdaysProvider;

pub fn fetcher_for(kind: SourceKind) -> Arc<dyn Fetcher> {
    match kind {
        SourceKind::Series => Arc::new(TokenFileProvider::series()),
        SourceKind::Earnings => Arc::new(EarningsProvider),
        SourceKind::OpenInterest => Arc::new(TokenFileProvider::open_interest()),
        SourceKind::ConsolidatedTrades => Arc::new(TokenFileProvider::consolidated_trades()),
        SourceKind::DailyTrades => Arc::new(DailyTradesProvider),
    }
}

/// Builds the source table from configuration, keeping its order.
pub fn build_sources(configs: &[SourceConfig]) -> Vec<Source> {
    configs
        .iter()
        .map(|c| Source::new(&c.name, c.filename.as_deref(), fetcher_for(c.kind)))
        .collect()
}
