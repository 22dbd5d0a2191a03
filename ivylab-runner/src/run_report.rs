//! Structured record of one run.
//!
//! Every document gets an entry whether it succeeded or not, so a failed
//! document is visible after the fact instead of only in the log.

use crate::generator::GenerationStage;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use ivylab_core::data::DroppedRow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current schema version for `run_report.json`.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub documents: Vec<DocumentReport>,
}

impl RunReport {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at,
            documents: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.documents.iter().filter(|d| d.outcome.is_failed()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn document(&self, file_name: &str) -> Option<&DocumentReport> {
        self.documents.iter().find(|d| d.file_name == file_name)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file_name: String,
    pub range: Option<ReportRange>,
    pub outcome: DocumentOutcome,
    #[serde(default)]
    pub dropped_rows: Vec<DroppedRow>,
    /// Non-fatal notes: missing descriptions, tables rendered as N/A.
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub sync: Vec<SyncOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Succeeded {
        paths: Vec<PathBuf>,
        content_hash: String,
        symbols: usize,
    },
    Failed {
        stage: GenerationStage,
        error: String,
    },
}

impl DocumentOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DocumentOutcome::Failed { .. })
    }

    pub fn content_hash(&self) -> Option<&str> {
        match self {
            DocumentOutcome::Succeeded { content_hash, .. } => Some(content_hash),
            DocumentOutcome::Failed { .. } => None,
        }
    }
}

/// Result of pushing one document to one remote target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub account: String,
    pub spreadsheet_id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_cells: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
