//! PriceObservation — one trading day for one symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily row of price fields.
///
/// Field values are positional; the owning [`StockSeries`](super::StockSeries)
/// holds the column names. Field 0 is always the adjusted close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub fields: Vec<Option<f64>>,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, fields: Vec<Option<f64>>) -> Self {
        Self { date, fields }
    }

    /// Returns true when every field carries a finite value.
    pub fn is_complete(&self) -> bool {
        !self.fields.is_empty()
            && self
                .fields
                .iter()
                .all(|f| matches!(f, Some(v) if v.is_finite()))
    }

    /// Adjusted close (field 0), if present.
    pub fn adjusted_close(&self) -> Option<f64> {
        self.fields.first().copied().flatten()
    }

    pub fn field(&self, index: usize) -> Option<f64> {
        self.fields.get(index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn complete_row() {
        let obs = PriceObservation::new(day(1), vec![Some(10.0), Some(11.0)]);
        assert!(obs.is_complete());
        assert_eq!(obs.adjusted_close(), Some(10.0));
        assert_eq!(obs.field(1), Some(11.0));
    }

    #[test]
    fn null_field_makes_row_incomplete() {
        let obs = PriceObservation::new(day(1), vec![Some(10.0), None]);
        assert!(!obs.is_complete());
    }

    #[test]
    fn nan_field_makes_row_incomplete() {
        let obs = PriceObservation::new(day(1), vec![Some(f64::NAN), Some(1.0)]);
        assert!(!obs.is_complete());
    }

    #[test]
    fn empty_row_is_incomplete() {
        assert!(!PriceObservation::new(day(1), vec![]).is_complete());
    }
}
