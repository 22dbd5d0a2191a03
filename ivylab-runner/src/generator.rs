//! Report generator: one document config in, one workbook out.
//!
//! Stages per document:
//! `Idle → RangePlanned → PerSymbolProcessing → DashboardAssembled →
//! Serialized → RemoteSynced → Done`. Any symbol failure abandons the
//! document; [`ReportGenerator::run`] records it and moves on to the next.
//! Remote sync failures are recorded but never fail the document.

use crate::config::{DocumentConfig, PortfolioConfig, ProviderConfig, ProviderKind};
use crate::export::{serializer_for, ExportError, WorkbookSerializer};
use crate::run_report::{DocumentOutcome, DocumentReport, ReportRange, RunReport, SyncOutcome};
use crate::sync::{GoogleSheetsSync, RemoteSync, SyncError};
use chrono::{NaiveDate, Utc};
use ivylab_core::dashboard::{
    assemble_workbook, render_data_sheet, DashboardBuilder, DashboardError, SignalRow,
};
use ivylab_core::data::{
    ingest, CircuitBreaker, CsvDirectoryClient, DataError, DroppedRow, FetchProgress,
    FinancialDataClient, RawHistory, SilentProgress, YahooClient, YahooSettings,
};
use ivylab_core::domain::{SeriesError, SpecError};
use ivylab_core::indicators::{compute_all, AnchorRule};
use ivylab_core::planning::DateRange;
use ivylab_core::workbook::{Sheet, Workbook, WorkbookError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Idle,
    RangePlanned,
    PerSymbolProcessing,
    DashboardAssembled,
    Serialized,
    RemoteSynced,
    Done,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::Idle => "idle",
            GenerationStage::RangePlanned => "range_planned",
            GenerationStage::PerSymbolProcessing => "per_symbol_processing",
            GenerationStage::DashboardAssembled => "dashboard_assembled",
            GenerationStage::Serialized => "serialized",
            GenerationStage::RemoteSynced => "remote_synced",
            GenerationStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("fetch failed for {symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("bad price history for {symbol}: {source}")]
    Series {
        symbol: String,
        #[source]
        source: SeriesError,
    },

    #[error("invalid moving average: {0}")]
    Spec(#[from] SpecError),

    #[error("dashboard error: {0}")]
    Dashboard(#[from] DashboardError),

    #[error("workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    #[error("serialization failed: {0}")]
    Serialize(#[from] ExportError),

    #[error("cancelled")]
    Cancelled,
}

/// Shared cancellation switch, honored before each symbol fetch and each
/// remote-sync call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fully built, not yet serialized document.
#[derive(Debug, Clone)]
pub struct Report {
    pub file_name: String,
    pub range: DateRange,
    pub workbook: Workbook,
    /// Aligned with the document's symbol list.
    pub descriptions: Vec<Option<String>>,
    pub dropped: Vec<DroppedRow>,
    pub signals: Vec<SignalRow>,
    pub warnings: Vec<String>,
}

impl Report {
    /// BLAKE3 over the dashboard's resolved values.
    pub fn content_hash(&self) -> String {
        self.workbook
            .dashboard()
            .map(Sheet::content_hash)
            .unwrap_or_default()
    }
}

/// A document that failed, with the stage it reached.
#[derive(Debug)]
pub struct DocumentFailure {
    pub stage: GenerationStage,
    pub error: GenerateError,
}

struct Fetched {
    description: Option<String>,
    history: RawHistory,
}

struct StageTracker<'a> {
    file_name: &'a str,
    stage: GenerationStage,
}

impl<'a> StageTracker<'a> {
    fn new(file_name: &'a str) -> Self {
        Self {
            file_name,
            stage: GenerationStage::Idle,
        }
    }

    fn advance(&mut self, next: GenerationStage) {
        info!(document = self.file_name, from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }

    fn fail(&self, error: GenerateError) -> DocumentFailure {
        DocumentFailure {
            stage: self.stage,
            error,
        }
    }
}

/// Build the configured price client.
pub fn client_from_config(
    provider: &ProviderConfig,
) -> Result<Arc<dyn FinancialDataClient>, DataError> {
    match provider.kind {
        ProviderKind::Yahoo => {
            let settings = YahooSettings {
                max_retries: provider.max_retries,
                retry_delay: Duration::from_millis(provider.retry_delay_ms),
                timeout: Duration::from_secs(provider.timeout_secs),
            };
            let breaker = Arc::new(CircuitBreaker::default_provider());
            Ok(Arc::new(YahooClient::new(breaker, settings)?))
        }
        ProviderKind::Csv => {
            let dir = provider
                .data_dir
                .as_ref()
                .ok_or_else(|| DataError::Other("csv provider requires data_dir".into()))?;
            Ok(Arc::new(CsvDirectoryClient::open(dir)?))
        }
    }
}

pub struct ReportGenerator {
    client: Arc<dyn FinancialDataClient>,
    serializers: Vec<Box<dyn WorkbookSerializer>>,
    sync: Option<Arc<dyn RemoteSync>>,
    output_dir: PathBuf,
    anchor_rule: AnchorRule,
    parallel_fetch: bool,
    cancel: CancelFlag,
    progress: Arc<dyn FetchProgress>,
}

impl ReportGenerator {
    pub fn new(client: Arc<dyn FinancialDataClient>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            serializers: Vec::new(),
            sync: None,
            output_dir: output_dir.into(),
            anchor_rule: AnchorRule::default(),
            parallel_fetch: false,
            cancel: CancelFlag::new(),
            progress: Arc::new(SilentProgress),
        }
    }

    /// Generator wired from a portfolio config. Remote sync is only set up
    /// when some document has a remote target.
    pub fn from_config(
        config: &PortfolioConfig,
        client: Arc<dyn FinancialDataClient>,
    ) -> Result<Self, SyncError> {
        let mut generator = Self::new(client, &config.output_dir)
            .with_anchor_rule(config.anchor)
            .with_parallel_fetch(config.parallel_fetch);
        for format in &config.formats {
            generator = generator.with_serializer(serializer_for(*format));
        }
        if config.documents.iter().any(|d| !d.remote_targets.is_empty()) {
            let sync = GoogleSheetsSync::new(config.accounts.clone())?;
            generator = generator.with_sync(Arc::new(sync));
        }
        Ok(generator)
    }

    pub fn with_serializer(mut self, serializer: Box<dyn WorkbookSerializer>) -> Self {
        self.serializers.push(serializer);
        self
    }

    pub fn with_sync(mut self, sync: Arc<dyn RemoteSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_anchor_rule(mut self, anchor_rule: AnchorRule) -> Self {
        self.anchor_rule = anchor_rule;
        self
    }

    pub fn with_parallel_fetch(mut self, parallel_fetch: bool) -> Self {
        self.parallel_fetch = parallel_fetch;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process every document in order. Never fails as a whole.
    pub fn run(&self, documents: &[DocumentConfig], today: NaiveDate) -> RunReport {
        let mut report = RunReport::new(Utc::now());
        info!(documents = documents.len(), client = self.client.name(), "starting run");

        for doc in documents {
            if self.cancel.is_cancelled() {
                warn!(document = %doc.file_name, "run cancelled, skipping document");
                report.documents.push(failed_report(
                    doc,
                    None,
                    DocumentFailure {
                        stage: GenerationStage::Idle,
                        error: GenerateError::Cancelled,
                    },
                ));
                continue;
            }
            report.documents.push(self.generate_document(doc, today));
        }

        info!(
            documents = report.documents.len(),
            failed = report.failed_count(),
            "run finished"
        );
        report
    }

    /// Build, serialize and sync one document.
    pub fn generate_document(&self, doc: &DocumentConfig, today: NaiveDate) -> DocumentReport {
        let mut tracker = StageTracker::new(&doc.file_name);

        let report = match self.build_tracked(doc, today, &mut tracker) {
            Ok(report) => report,
            Err(error) => {
                let failure = tracker.fail(error);
                error!(
                    document = %doc.file_name,
                    stage = %failure.stage,
                    error = %failure.error,
                    "document abandoned"
                );
                let range = doc.date_range(today);
                return failed_report(doc, Some(range), failure);
            }
        };

        let paths = match self.serialize(&report) {
            Ok(paths) => paths,
            Err(error) => {
                let failure = tracker.fail(error);
                error!(document = %doc.file_name, error = %failure.error, "serialization failed");
                return DocumentReport {
                    dropped_rows: report.dropped,
                    warnings: report.warnings,
                    ..failed_report(doc, Some(report.range), failure)
                };
            }
        };
        tracker.advance(GenerationStage::Serialized);

        let sync = self.push_remote(&report, doc);
        if !doc.remote_targets.is_empty() {
            tracker.advance(GenerationStage::RemoteSynced);
        }
        tracker.advance(GenerationStage::Done);

        DocumentReport {
            file_name: doc.file_name.clone(),
            range: Some(report_range(&report.range)),
            outcome: DocumentOutcome::Succeeded {
                paths,
                content_hash: report.content_hash(),
                symbols: doc.symbols.len(),
            },
            dropped_rows: report.dropped,
            warnings: report.warnings,
            sync,
        }
    }

    /// Build the workbook for one document without writing anything.
    pub fn build(&self, doc: &DocumentConfig, today: NaiveDate) -> Result<Report, DocumentFailure> {
        let mut tracker = StageTracker::new(&doc.file_name);
        self.build_tracked(doc, today, &mut tracker)
            .map_err(|error| tracker.fail(error))
    }

    fn build_tracked(
        &self,
        doc: &DocumentConfig,
        today: NaiveDate,
        tracker: &mut StageTracker<'_>,
    ) -> Result<Report, GenerateError> {
        for spec in &doc.moving_averages {
            spec.validate()?;
        }
        let range = doc.date_range(today);
        tracker.advance(GenerationStage::RangePlanned);
        info!(
            document = %doc.file_name,
            start = %range.start,
            end = %range.end,
            month_aligned = range.needs_month_alignment,
            "planned date range"
        );

        let specs = &doc.moving_averages;
        let mut dashboard = DashboardBuilder::new(&doc.symbols, specs)?;
        tracker.advance(GenerationStage::PerSymbolProcessing);

        let total = doc.symbols.len();
        let mut prefetched: VecDeque<Result<Fetched, GenerateError>> = if self.parallel_fetch {
            self.prefetch(&doc.symbols, &range)?
        } else {
            VecDeque::new()
        };

        let mut descriptions = Vec::with_capacity(total);
        let mut data_sheets = Vec::with_capacity(total);
        let mut dropped = Vec::new();
        let mut signals = Vec::new();
        let mut warnings = Vec::new();

        for (index, symbol) in doc.symbols.iter().enumerate() {
            let fetched = match prefetched.pop_front() {
                Some(result) => result,
                None => self.fetch_one(symbol, index, total, &range),
            };
            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(e) => {
                    if !self.parallel_fetch {
                        self.progress.on_batch_complete(index, 1, total);
                    }
                    return Err(e);
                }
            };

            if fetched.description.is_none() {
                warnings.push(format!("{symbol}: no description"));
            }
            descriptions.push(fetched.description);

            let ingested = ingest(symbol, fetched.history).map_err(|source| GenerateError::Series {
                symbol: symbol.clone(),
                source,
            })?;
            dropped.extend(ingested.dropped);
            let series = ingested.series;
            if series.is_empty() {
                return Err(GenerateError::Fetch {
                    symbol: symbol.clone(),
                    source: DataError::NoData { symbol: symbol.clone() },
                });
            }

            let averages = compute_all(&series, specs, self.anchor_rule);
            let data = render_data_sheet(&series, specs, &averages)?;
            for (spec, source) in specs.iter().zip(&data.sources) {
                if source.is_none() {
                    let title = spec.display_title();
                    warn!(symbol = %symbol, table = %title, "not enough history, rendering N/A");
                    warnings.push(format!("{symbol}: not enough history for {title}"));
                }
            }

            signals.extend(dashboard.add_symbol(index, &data.sources)?);
            data_sheets.push(data.sheet);
            debug!(symbol = %symbol, rows = series.len(), "symbol processed");
        }
        if !self.parallel_fetch {
            self.progress.on_batch_complete(total, 0, total);
        }

        let (sheet, names) = dashboard.finish(&descriptions)?;
        let workbook = assemble_workbook(sheet, names, data_sheets)?;
        tracker.advance(GenerationStage::DashboardAssembled);

        Ok(Report {
            file_name: doc.file_name.clone(),
            range,
            workbook,
            descriptions,
            dropped,
            signals,
            warnings,
        })
    }

    fn check_cancelled(&self) -> Result<(), GenerateError> {
        if self.cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        Ok(())
    }

    /// Fetch description and history for one symbol. A failed description
    /// lookup is logged and treated as missing.
    fn fetch_one(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        range: &DateRange,
    ) -> Result<Fetched, GenerateError> {
        self.check_cancelled()?;
        self.progress.on_start(symbol, index, total);

        let description = match self.client.description(symbol) {
            Ok(d) => d.filter(|d| !d.trim().is_empty()),
            Err(e) => {
                warn!(symbol, error = %e, "description lookup failed");
                None
            }
        };
        let history = self.client.price_history(symbol, range.start, range.end);

        let status = history.as_ref().map(|_| ()).map_err(|e| e.to_string());
        self.progress.on_complete(symbol, index, total, &status);

        let history = history.map_err(|source| GenerateError::Fetch {
            symbol: symbol.to_string(),
            source,
        })?;
        Ok(Fetched { description, history })
    }

    /// Fetch every symbol on the rayon pool, returned in symbol order.
    fn prefetch(
        &self,
        symbols: &[String],
        range: &DateRange,
    ) -> Result<VecDeque<Result<Fetched, GenerateError>>, GenerateError> {
        self.check_cancelled()?;
        let total = symbols.len();
        let results: Vec<Result<Fetched, GenerateError>> = symbols
            .par_iter()
            .enumerate()
            .map(|(index, symbol)| self.fetch_one(symbol, index, total, range))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        self.progress.on_batch_complete(total - failed, failed, total);
        Ok(results.into())
    }

    /// Run every serializer. On failure, files already written for this
    /// document are removed.
    fn serialize(&self, report: &Report) -> Result<Vec<PathBuf>, GenerateError> {
        let mut written = Vec::new();
        for serializer in &self.serializers {
            match serializer.write(&report.workbook, &self.output_dir, &report.file_name) {
                Ok(paths) => {
                    debug!(
                        document = %report.file_name,
                        format = ?serializer.format(),
                        files = paths.len(),
                        "serialized"
                    );
                    written.extend(paths);
                }
                Err(e) => {
                    for path in &written {
                        if let Err(remove) = std::fs::remove_file(path) {
                            warn!(
                                path = %path.display(),
                                error = %remove,
                                "could not remove partial output"
                            );
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(written)
    }

    fn push_remote(&self, report: &Report, doc: &DocumentConfig) -> Vec<SyncOutcome> {
        let mut outcomes = Vec::with_capacity(doc.remote_targets.len());
        for target in &doc.remote_targets {
            let result = if self.cancel.is_cancelled() {
                Err("cancelled".to_string())
            } else {
                match &self.sync {
                    Some(sync) => sync
                        .push(&report.workbook, target)
                        .map_err(|e| e.to_string()),
                    None => Err("remote sync is not configured".to_string()),
                }
            };

            let outcome = match result {
                Ok(summary) => {
                    info!(
                        document = %doc.file_name,
                        spreadsheet = %target.spreadsheet_id,
                        cells = summary.updated_cells,
                        "remote sync complete"
                    );
                    SyncOutcome {
                        account: target.account.clone(),
                        spreadsheet_id: target.spreadsheet_id.clone(),
                        ok: true,
                        updated_cells: Some(summary.updated_cells),
                        error: None,
                    }
                }
                Err(error) => {
                    warn!(
                        document = %doc.file_name,
                        spreadsheet = %target.spreadsheet_id,
                        error = %error,
                        "remote sync failed"
                    );
                    SyncOutcome {
                        account: target.account.clone(),
                        spreadsheet_id: target.spreadsheet_id.clone(),
                        ok: false,
                        updated_cells: None,
                        error: Some(error),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn report_range(range: &DateRange) -> ReportRange {
    ReportRange {
        start: range.start,
        end: range.end,
    }
}

fn failed_report(
    doc: &DocumentConfig,
    range: Option<DateRange>,
    failure: DocumentFailure,
) -> DocumentReport {
    DocumentReport {
        file_name: doc.file_name.clone(),
        range: range.as_ref().map(report_range),
        outcome: DocumentOutcome::Failed {
            stage: failure.stage,
            error: failure.error.to_string(),
        },
        dropped_rows: Vec::new(),
        warnings: Vec::new(),
        sync: Vec::new(),
    }
}
