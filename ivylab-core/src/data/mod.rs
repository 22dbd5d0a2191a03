//! Price-data clients and ingest.

pub mod circuit_breaker;
pub mod csv_dir;
pub mod ingest;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_dir::{CsvDirectoryClient, DESCRIPTIONS_FILE};
pub use ingest::{
    ingest, is_missing, parse_date, DropReason, DroppedRow, IngestResult, MISSING_MARKERS,
};
pub use provider::{
    DataError, FetchProgress, FinancialDataClient, RawHistory, RawRow, SilentProgress,
    StdoutProgress,
};
pub use yahoo::{YahooClient, YahooSettings, CHART_COLUMNS};
