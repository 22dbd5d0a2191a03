//! Ingest: raw client rows → validated [`StockSeries`].
//!
//! Bad rows never fail the symbol. Each one is dropped with a reason that is
//! logged and returned to the caller for the run report.

use super::provider::RawHistory;
use crate::domain::{is_adjusted_close, PriceObservation, SeriesError, StockSeries, ADJUSTED_CLOSE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Tokens read as a null value, compared case-insensitively.
pub const MISSING_MARKERS: &[&str] = &["", "null", "nan", "n/a", "missing"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    FieldCount { expected: usize, actual: usize },
    UnparseableDate,
    UnparseableValue { column: String, token: String },
    Incomplete { column: String },
    DuplicateDate,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::FieldCount { expected, actual } => {
                write!(f, "expected {expected} fields, found {actual}")
            }
            DropReason::UnparseableDate => write!(f, "unparseable date"),
            DropReason::UnparseableValue { column, token } => {
                write!(f, "unparseable value '{token}' in {column}")
            }
            DropReason::Incomplete { column } => write!(f, "missing value in {column}"),
            DropReason::DuplicateDate => write!(f, "duplicate date"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub symbol: String,
    pub date: String,
    #[serde(flatten)]
    pub reason: DropReason,
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub series: StockSeries,
    pub dropped: Vec<DroppedRow>,
}

pub fn is_missing(token: &str) -> bool {
    let t = token.trim();
    MISSING_MARKERS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

pub fn parse_date(token: &str) -> Option<NaiveDate> {
    let t = token.trim();
    // Timestamps like 2024-05-31T00:00:00Z keep only the day.
    let t = t.get(..10).filter(|_| t.len() > 10 && t.as_bytes()[10] == b'T').unwrap_or(t);
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(t, f).ok())
}

/// Parse one token; `Ok(None)` for a missing marker.
fn parse_value(token: &str) -> Result<Option<f64>, ()> {
    if is_missing(token) {
        return Ok(None);
    }
    let cleaned: String = token.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(()),
    }
}

/// Canonical column names; an adjusted-close alias in front becomes [`ADJUSTED_CLOSE`].
fn normalize_columns(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 && is_adjusted_close(c) {
                ADJUSTED_CLOSE.to_string()
            } else {
                c.trim().to_string()
            }
        })
        .collect()
}

pub fn ingest(symbol: &str, history: RawHistory) -> Result<IngestResult, SeriesError> {
    let columns = normalize_columns(&history.columns);
    let mut dropped = Vec::new();
    let mut seen = HashSet::new();
    let mut observations = Vec::with_capacity(history.rows.len());

    let mut drop_row = |date: &str, reason: DropReason| {
        tracing::warn!(symbol, date, %reason, "dropping price row");
        dropped.push(DroppedRow {
            symbol: symbol.to_string(),
            date: date.to_string(),
            reason,
        });
    };

    'rows: for row in history.rows {
        if row.values.len() != columns.len() {
            drop_row(
                &row.date,
                DropReason::FieldCount {
                    expected: columns.len(),
                    actual: row.values.len(),
                },
            );
            continue;
        }
        let Some(date) = parse_date(&row.date) else {
            drop_row(&row.date, DropReason::UnparseableDate);
            continue;
        };

        let mut fields = Vec::with_capacity(columns.len());
        for (column, token) in columns.iter().zip(&row.values) {
            match parse_value(token) {
                Ok(Some(v)) => fields.push(Some(v)),
                Ok(None) => {
                    drop_row(&row.date, DropReason::Incomplete { column: column.clone() });
                    continue 'rows;
                }
                Err(()) => {
                    drop_row(
                        &row.date,
                        DropReason::UnparseableValue {
                            column: column.clone(),
                            token: token.clone(),
                        },
                    );
                    continue 'rows;
                }
            }
        }

        if !seen.insert(date) {
            drop_row(&row.date, DropReason::DuplicateDate);
            continue;
        }
        observations.push(PriceObservation::new(date, fields));
    }

    let series = StockSeries::new(symbol, columns, observations)?;
    tracing::debug!(
        symbol,
        rows = series.len(),
        dropped = dropped.len(),
        "ingested price history"
    );
    Ok(IngestResult { series, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RawRow;

    fn history(columns: &[&str], rows: &[(&str, &[&str])]) -> RawHistory {
        RawHistory {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(d, vals)| RawRow::new(*d, vals.iter().map(|v| v.to_string()).collect()))
                .collect(),
        }
    }

    #[test]
    fn sorts_ascending() {
        let h = history(
            &["Adj Close", "Close"],
            &[
                ("2024-06-03", &["3.0", "3.1"]),
                ("2024-05-31", &["2.0", "2.1"]),
                ("2024-05-30", &["1.0", "1.1"]),
            ],
        );
        let result = ingest("VTI", h).unwrap();
        assert_eq!(result.series.columns()[0], ADJUSTED_CLOSE);
        assert_eq!(result.series.adjusted_closes(), vec![1.0, 2.0, 3.0]);
        assert!(result.dropped.is_empty());
    }

    #[test]
    fn missing_markers_drop_whole_row() {
        let h = history(
            &["Adjusted Close", "Volume"],
            &[
                ("2024-05-28", &["1.0", "100"]),
                ("2024-05-29", &["null", "100"]),
                ("2024-05-30", &["2.0", "NaN"]),
                ("2024-05-31", &["3.0", "N/A"]),
                ("2024-06-03", &["4.0", ""]),
                ("2024-06-04", &["5.0", "missing"]),
                ("2024-06-05", &["6.0", "1,200"]),
            ],
        );
        let result = ingest("VTI", h).unwrap();
        let dates: Vec<NaiveDate> = result.series.observations().iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 28).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            ]
        );
        assert_eq!(result.dropped.len(), 5);
        assert!(result
            .dropped
            .iter()
            .all(|d| matches!(d.reason, DropReason::Incomplete { .. })));
        assert_eq!(result.series.value(1, 1), Some(1200.0));
    }

    #[test]
    fn malformed_rows_dropped_with_reason() {
        let h = history(
            &["Adjusted Close", "Close"],
            &[
                ("2024-05-28", &["1.0"]),
                ("yesterday", &["1.0", "1.0"]),
                ("2024-05-30", &["abc", "1.0"]),
                ("2024-05-31", &["2.0", "2.0"]),
            ],
        );
        let result = ingest("VTI", h).unwrap();
        assert_eq!(result.series.len(), 1);
        let reasons: Vec<&DropReason> = result.dropped.iter().map(|d| &d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &DropReason::FieldCount { expected: 2, actual: 1 },
                &DropReason::UnparseableDate,
                &DropReason::UnparseableValue {
                    column: "Adjusted Close".into(),
                    token: "abc".into()
                },
            ]
        );
    }

    #[test]
    fn duplicate_date_keeps_first() {
        let h = history(
            &["Adjusted Close"],
            &[("2024-05-31", &["1.0"]), ("2024-05-31", &["9.0"])],
        );
        let result = ingest("VTI", h).unwrap();
        assert_eq!(result.series.adjusted_closes(), vec![1.0]);
        assert_eq!(result.dropped[0].reason, DropReason::DuplicateDate);
    }

    #[test]
    fn wrong_first_column_is_a_series_error() {
        let h = history(&["Open", "Adjusted Close"], &[("2024-05-31", &["1.0", "1.0"])]);
        assert!(matches!(
            ingest("VTI", h),
            Err(SeriesError::FirstColumnNotAdjustedClose { .. })
        ));
    }

    #[test]
    fn date_parsing() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(parse_date("2024-05-31"), Some(d));
        assert_eq!(parse_date("2024/05/31"), Some(d));
        assert_eq!(parse_date("2024-05-31T00:00:00Z"), Some(d));
        assert_eq!(parse_date("31.05.2024"), None);
    }

    #[test]
    fn dropped_row_serializes_flat() {
        let row = DroppedRow {
            symbol: "VTI".into(),
            date: "2024-05-31".into(),
            reason: DropReason::Incomplete { column: "Volume".into() },
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["reason"], "incomplete");
        assert_eq!(json["column"], "Volume");
    }
}
