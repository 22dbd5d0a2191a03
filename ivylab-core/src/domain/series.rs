//! StockSeries — the ordered daily history for one symbol.

use super::observation::PriceObservation;
use chrono::NaiveDate;
use thiserror::Error;

/// Canonical name of field 0.
pub const ADJUSTED_CLOSE: &str = "Adjusted Close";

/// Header spellings accepted for the adjusted-close column.
const ADJUSTED_CLOSE_ALIASES: &[&str] = &["adjusted close", "adj close", "adj. close", "adjclose"];

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series for '{symbol}' has no price columns")]
    NoColumns { symbol: String },

    #[error("first column for '{symbol}' must be the adjusted close, found '{found}'")]
    FirstColumnNotAdjustedClose { symbol: String, found: String },

    #[error("row {date} for '{symbol}' has {actual} fields, expected {expected}")]
    FieldCount {
        symbol: String,
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate observation for '{symbol}' on {date}")]
    DuplicateDate { symbol: String, date: NaiveDate },
}

/// Returns true if `name` names the adjusted-close column.
pub fn is_adjusted_close(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    ADJUSTED_CLOSE_ALIASES.contains(&lower.as_str())
}

/// Daily observations for one symbol, ascending by date.
///
/// Invariants upheld by [`StockSeries::new`]:
/// - dates are unique and strictly ascending
/// - every stored row is complete (no null field)
/// - column 0 is the adjusted close
#[derive(Debug, Clone, PartialEq)]
pub struct StockSeries {
    symbol: String,
    columns: Vec<String>,
    observations: Vec<PriceObservation>,
    excluded_incomplete: usize,
}

impl StockSeries {
    /// Build a series from observations in any order.
    ///
    /// Incomplete rows are removed here and counted in
    /// [`excluded_incomplete`](Self::excluded_incomplete).
    pub fn new(
        symbol: impl Into<String>,
        columns: Vec<String>,
        observations: Vec<PriceObservation>,
    ) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        let first = columns.first().ok_or_else(|| SeriesError::NoColumns {
            symbol: symbol.clone(),
        })?;
        if !is_adjusted_close(first) {
            return Err(SeriesError::FirstColumnNotAdjustedClose {
                symbol,
                found: first.clone(),
            });
        }

        for obs in &observations {
            if obs.fields.len() != columns.len() {
                return Err(SeriesError::FieldCount {
                    symbol,
                    date: obs.date,
                    expected: columns.len(),
                    actual: obs.fields.len(),
                });
            }
        }

        let mut observations = observations;
        observations.sort_by_key(|o| o.date);
        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate {
                symbol,
                date: pair[0].date,
            });
        }

        let before = observations.len();
        observations.retain(PriceObservation::is_complete);
        let excluded_incomplete = before - observations.len();

        Ok(Self {
            symbol,
            columns,
            observations,
            excluded_incomplete,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Column names; index 0 is the adjusted close.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn observations(&self) -> &[PriceObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PriceObservation> {
        self.observations.get(index)
    }

    /// Most recent observation.
    pub fn latest(&self) -> Option<&PriceObservation> {
        self.observations.last()
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.observations.get(index).map(|o| o.date)
    }

    /// Null-aware field access by row and column index.
    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        self.observations.get(row).and_then(|o| o.field(column))
    }

    /// Adjusted-close values in ascending date order.
    pub fn adjusted_closes(&self) -> Vec<f64> {
        self.observations
            .iter()
            .filter_map(PriceObservation::adjusted_close)
            .collect()
    }

    /// Number of incomplete rows removed during construction.
    pub fn excluded_incomplete(&self) -> usize {
        self.excluded_incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn cols() -> Vec<String> {
        vec![ADJUSTED_CLOSE.to_string(), "Close".to_string()]
    }

    #[test]
    fn descending_input_is_stored_ascending() {
        let series = StockSeries::new(
            "VTI",
            cols(),
            vec![
                PriceObservation::new(date(1, 4), vec![Some(3.0), Some(3.0)]),
                PriceObservation::new(date(1, 3), vec![Some(2.0), Some(2.0)]),
                PriceObservation::new(date(1, 2), vec![Some(1.0), Some(1.0)]),
            ],
        )
        .unwrap();
        assert_eq!(series.adjusted_closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.latest().unwrap().date, date(1, 4));
    }

    #[test]
    fn incomplete_rows_are_excluded() {
        let series = StockSeries::new(
            "VTI",
            cols(),
            vec![
                PriceObservation::new(date(1, 2), vec![Some(1.0), Some(1.0)]),
                PriceObservation::new(date(1, 3), vec![Some(2.0), None]),
                PriceObservation::new(date(1, 4), vec![Some(3.0), Some(3.0)]),
            ],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.excluded_incomplete(), 1);
        assert!(series.observations().iter().all(|o| o.date != date(1, 3)));
    }

    #[test]
    fn duplicate_dates_rejected() {
        let err = StockSeries::new(
            "VTI",
            cols(),
            vec![
                PriceObservation::new(date(1, 2), vec![Some(1.0), Some(1.0)]),
                PriceObservation::new(date(1, 2), vec![Some(2.0), Some(2.0)]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::DuplicateDate { .. }));
    }

    #[test]
    fn first_column_must_be_adjusted_close() {
        let err = StockSeries::new("VTI", vec!["Close".into()], vec![]).unwrap_err();
        assert!(matches!(err, SeriesError::FirstColumnNotAdjustedClose { .. }));
    }

    #[test]
    fn adjusted_close_aliases() {
        assert!(is_adjusted_close("Adj Close"));
        assert!(is_adjusted_close(" adjusted close "));
        assert!(!is_adjusted_close("Close"));
    }

    #[test]
    fn field_count_mismatch_rejected() {
        let err = StockSeries::new(
            "VTI",
            cols(),
            vec![PriceObservation::new(date(1, 2), vec![Some(1.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::FieldCount { expected: 2, actual: 1, .. }));
    }
}
