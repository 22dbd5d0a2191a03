//! Financial-data client trait and structured error types.
//!
//! The FinancialDataClient trait abstracts over data sources (Yahoo Finance,
//! a directory of CSV exports) so we can swap implementations and mock for tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw history as returned by a client, before ingest.
///
/// Values are unparsed tokens; literal missing markers ("null", "NaN", ...)
/// are left for the ingest step to interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHistory {
    /// Field names; the first is expected to be the adjusted close.
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: String,
    pub values: Vec<String>,
}

impl RawRow {
    pub fn new(date: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            date: date.into(),
            values,
        }
    }
}

impl RawHistory {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no price data for '{symbol}' in the requested range")]
    NoData { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Worth another attempt after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::AuthenticationRequired(_)
        )
    }
}

/// Trait for financial-data clients.
///
/// Implementations handle retries and authentication themselves; callers see
/// either data or a final error.
pub trait FinancialDataClient: Send + Sync {
    /// Human-readable name of this client.
    fn name(&self) -> &str;

    /// Display name for a symbol. `Ok(None)` when the source has none.
    fn description(&self, symbol: &str) -> Result<Option<String>, DataError>;

    /// Daily history for a symbol over `start..=end`.
    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawHistory, DataError>;

    /// Check if the client is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol fetches.
pub trait FetchProgress: Send + Sync {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), String>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, result: &Result<(), String>) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("{succeeded}/{total} symbols fetched, {failed} failed");
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<(), String>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
