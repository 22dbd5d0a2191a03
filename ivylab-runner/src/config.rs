//! Portfolio configuration, loaded from TOML.
//!
//! One file describes the output location, the price provider, the accounts
//! used for remote sync, and an ordered list of documents. Document order is
//! the processing order; symbol and moving-average order inside a document
//! are the dashboard order.

use chrono::NaiveDate;
use ivylab_core::dashboard::data_sheet_names;
use ivylab_core::domain::{MovingAverageSpec, SpecError};
use ivylab_core::indicators::AnchorRule;
use ivylab_core::planning::{plan_date_range, DateRange, LOOKBACK_MONTHS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("document '{document}': {source}")]
    Spec {
        document: String,
        #[source]
        source: SpecError,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Workbook serializers to run for every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Directory of `<SYMBOL>.csv` files; csv provider only.
    pub data_dir: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Yahoo,
            data_dir: None,
            max_retries: 3,
            retry_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Credentials for one remote-sync account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Environment variable holding the bearer token.
    pub token_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub account: String,
    pub spreadsheet_id: String,
}

/// One report file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub file_name: String,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub moving_averages: Vec<MovingAverageSpec>,
    #[serde(default)]
    pub remote_targets: Vec<RemoteTarget>,
}

impl DocumentConfig {
    pub fn date_range(&self, today: NaiveDate) -> DateRange {
        plan_date_range(&self.moving_averages, today)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Json]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    #[serde(default)]
    pub parallel_fetch: bool,
    #[serde(default)]
    pub anchor: AnchorRule,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
    #[serde(default)]
    pub documents: Vec<DocumentConfig>,
}

impl PortfolioConfig {
    /// Load a config file. Relative paths inside it resolve against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        if let Some(dir) = self.provider.data_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    pub fn document(&self, file_name: &str) -> Option<&DocumentConfig> {
        self.documents.iter().find(|d| d.file_name == file_name)
    }

    /// Check structural rules. Returns non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if self.documents.is_empty() {
            return Err(ConfigError::Invalid("no documents configured".into()));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Invalid("formats must list at least one output".into()));
        }
        if self.provider.kind == ProviderKind::Csv && self.provider.data_dir.is_none() {
            return Err(ConfigError::Invalid(
                "provider.kind = \"csv\" requires provider.data_dir".into(),
            ));
        }

        let mut file_names = HashSet::new();
        for doc in &self.documents {
            let name = doc.file_name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("document file_name is empty".into()));
            }
            if name.contains(&['/', '\\'][..]) {
                return Err(ConfigError::Invalid(format!(
                    "document file_name '{name}' must not contain path separators"
                )));
            }
            if !file_names.insert(name.to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!("duplicate document '{name}'")));
            }

            let mut symbols = HashSet::new();
            for symbol in &doc.symbols {
                let s = symbol.trim();
                if s.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "document '{name}' has an empty symbol"
                    )));
                }
                if !symbols.insert(s.to_ascii_uppercase()) {
                    return Err(ConfigError::Invalid(format!(
                        "document '{name}' lists '{s}' more than once"
                    )));
                }
            }
            data_sheet_names(&doc.symbols)
                .map_err(|e| ConfigError::Invalid(format!("document '{name}': {e}")))?;
            if doc.symbols.is_empty() {
                warnings.push(format!("document '{name}' has no symbols"));
            }

            if doc.moving_averages.is_empty() {
                warnings.push(format!("document '{name}' has no moving averages"));
            }
            for spec in &doc.moving_averages {
                spec.validate().map_err(|source| ConfigError::Spec {
                    document: name.to_string(),
                    source,
                })?;
                if spec.is_monthly() && spec.period > LOOKBACK_MONTHS as usize {
                    warnings.push(format!(
                        "document '{name}': {} needs more than the {LOOKBACK_MONTHS}-month history window and will show N/A",
                        spec.display_title()
                    ));
                }
            }

            for target in &doc.remote_targets {
                if !self.accounts.contains_key(&target.account) {
                    return Err(ConfigError::Invalid(format!(
                        "document '{name}' syncs to unknown account '{}'",
                        target.account
                    )));
                }
                if target.spreadsheet_id.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "document '{name}' has a remote target without spreadsheet_id"
                    )));
                }
            }
        }

        Ok(warnings)
    }
}
