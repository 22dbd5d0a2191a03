//! Moving-average definitions as configured per document.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Averaging algorithm. Only the simple (unweighted) mean is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    Simple,
}

/// Sampling granularity of the averaging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Day,
    Month,
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodType::Day => write!(f, "Day"),
            PeriodType::Month => write!(f, "Month"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("moving average period must be >= 1")]
    ZeroPeriod,
}

/// One configured moving average.
///
/// Order within a document is significant: it fixes the dashboard table
/// stacking order and the data-sheet column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovingAverageSpec {
    #[serde(default)]
    pub algorithm: Algorithm,
    pub period_type: PeriodType,
    pub period: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl MovingAverageSpec {
    pub fn daily(period: usize) -> Self {
        Self {
            algorithm: Algorithm::Simple,
            period_type: PeriodType::Day,
            period,
            title: None,
        }
    }

    pub fn monthly(period: usize) -> Self {
        Self {
            algorithm: Algorithm::Simple,
            period_type: PeriodType::Month,
            period,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_monthly(&self) -> bool {
        self.period_type == PeriodType::Month
    }

    /// Display title, e.g. "200 Day SMA" when none is configured.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(t) if !t.trim().is_empty() => t.clone(),
            _ => format!("{} {} SMA", self.period, self.period_type),
        }
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.period == 0 {
            return Err(SpecError::ZeroPeriod);
        }
        Ok(())
    }
}
