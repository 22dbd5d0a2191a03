//! IvyLab Runner — report orchestration, configuration, output and sync.
//!
//! This crate builds on `ivylab-core` to provide:
//! - TOML portfolio configuration with validation
//! - The report generator (per-document stages, parallel prefetch, cancel)
//! - Workbook serializers (JSON model, per-sheet CSV)
//! - Remote spreadsheet sync
//! - The structured run report
//! - Tracing subscriber setup

pub mod config;
pub mod export;
pub mod generator;
pub mod logging;
pub mod run_report;
pub mod sync;

pub use config::{
    AccountConfig, ConfigError, DocumentConfig, OutputFormat, PortfolioConfig, ProviderConfig,
    ProviderKind, RemoteTarget,
};
pub use export::{
    serializer_for, workbook_from_json, workbook_to_json, CsvWorkbookWriter, ExportError,
    JsonWorkbookWriter, WorkbookSerializer,
};
pub use generator::{
    client_from_config, CancelFlag, DocumentFailure, GenerateError, GenerationStage, Report,
    ReportGenerator,
};
pub use logging::{init_logging, LoggingConfig};
pub use run_report::{DocumentOutcome, DocumentReport, ReportRange, RunReport, SyncOutcome};
pub use sync::{value_ranges, GoogleSheetsSync, RemoteSync, SyncError, SyncSummary, ValueRange};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn generator_is_send_sync() {
        assert_send::<ReportGenerator>();
        assert_sync::<ReportGenerator>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<GenerateError>();
        assert_sync::<GenerateError>();
        assert_send::<SyncError>();
        assert_sync::<SyncError>();
    }

    #[test]
    fn run_report_is_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
    }
}
