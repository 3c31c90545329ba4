use crate::core::fetch::{DateSource, FetchError, Fetcher, Payload};
use crate::core::format::{earnings_csv, tab_to_csv};
use crate::core::session::{Session, initial_capacity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use tracing::{debug, instrument};

const WORKDAYS_PATH: &str = "/bdi/table/workdays";
const EXPORT_CSV_PATH: &str = "/bdi/table/export/csv";
const TICKER_CSV_PATH: &str = "/rapinegocios/tickercsv";
const REQUEST_NAME_PATH: &str = "/api/download/requestname";
const DOWNLOAD_PATH: &str = "/api/download/";

pub const OPEN_INTEREST_FILE: &str = "DerivativesOpenPositionFile";
pub const CONSOLIDATED_TRADES_FILE: &str = "TradeInformationConsolidatedFile";
pub const SERIES_FILE: &str = "InstrumentsConsolidatedFile";

/// Workdays published by the exchange around today.
pub struct WorkdaysProvider;

#[async_trait]
impl DateSource for WorkdaysProvider {
    async fn available_dates(&self, session: &Session) -> Result<Vec<String>, FetchError> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let url = session.url(WORKDAYS_PATH, &[("date", today.as_str())])?;
        let dates: Vec<String> = session.get_json(url).await?;
        debug!(count = dates.len(), "Received workdays");
        Ok(dates)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExportRequest<'a> {
    name: &'a str,
    date: &'a str,
    final_date: &'a str,
    client_id: &'a str,
    filters: serde_json::Map<String, serde_json::Value>,
}

/// Cash and stock distributions exported from the BDI table service.
pub struct EarningsProvider;

#[async_trait]
impl Fetcher for EarningsProvider {
    #[instrument(name = "EarningsFetch", skip(self, session))]
    async fn fetch(&self, session: &Session, date: &str) -> Result<Payload, FetchError> {
        let url = session.url(
            EXPORT_CSV_PATH,
            &[("sort", "TckrSymb"), ("lang", "pt-BR")],
        )?;
        let request = ExportRequest {
            name: "ProventionCreditVariable",
            date,
            final_date: date,
            client_id: "",
            filters: serde_json::Map::new(),
        };

        let content = session.post_json(url, &request).await?;
        Ok(Payload::Bytes(earnings_csv(&content)?))
    }
}

/// Tick-by-tick trades, published as a zip archive holding a single CSV.
pub struct DailyTradesProvider;

#[async_trait]
impl Fetcher for DailyTradesProvider {
    #[instrument(name = "DailyTradesFetch", skip(self, session))]
    async fn fetch(&self, session: &Session, date: &str) -> Result<Payload, FetchError> {
        let url = session.url(&format!("{TICKER_CSV_PATH}/{date}"), &[])?;
        let archive = session.download(url).await?;
        Ok(Payload::Bytes(first_archive_entry(archive)?))
    }
}

pub fn first_archive_entry(archive: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    if zip.is_empty() {
        return Err(FetchError::Payload("Trades archive is empty".to_string()));
    }

    let mut entry = zip.by_index(0)?;
    debug!(name = entry.name(), size = entry.size(), "Extracting archive entry");
    let mut content = Vec::with_capacity(initial_capacity(entry.size()));
    entry.read_to_end(&mut content)?;
    Ok(content)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Files served through the request-name/token download flow.
///
/// Open interest figures always describe the business day before `date`; that
/// is how the exchange publishes them.
pub struct TokenFileProvider {
    file_name: &'static str,
    normalize: bool,
}

impl TokenFileProvider {
    pub fn open_interest() -> Self {
        Self {
            file_name: OPEN_INTEREST_FILE,
            normalize: true,
        }
    }

    pub fn consolidated_trades() -> Self {
        Self {
            file_name: CONSOLIDATED_TRADES_FILE,
            normalize: true,
        }
    }

    pub fn series() -> Self {
        Self {
            file_name: SERIES_FILE,
            normalize: false,
        }
    }

    async fn request_token(&self, session: &Session, date: &str) -> Result<String, FetchError> {
        let url = session.url(
            REQUEST_NAME_PATH,
            &[
                ("fileName", self.file_name),
                ("date", date),
                ("recaptchaToken", ""),
            ],
        )?;
        let response: TokenResponse = session.get_json(url).await?;
        response
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                FetchError::Payload(format!("Missing download token for {}", self.file_name))
            })
    }
}

#[async_trait]
impl Fetcher for TokenFileProvider {
    #[instrument(name = "TokenFileFetch", skip(self, session), fields(file = self.file_name))]
    async fn fetch(&self, session: &Session, date: &str) -> Result<Payload, FetchError> {
        let token = self.request_token(session, date).await?;
        let url = session.url(DOWNLOAD_PATH, &[("token", token.as_str())])?;
        let content = session.get_bytes(url).await?;

        if self.normalize {
            Ok(Payload::Text(tab_to_csv(&content)?))
        } else {
            Ok(Payload::Bytes(content))
        }
    }
}
