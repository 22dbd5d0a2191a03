//! Moving-average engine.
//!
//! Indicators are pure functions: a [`StockSeries`] in, one optional value per
//! row out. Absent values mean "not enough history", never zero. The daily
//! average is computed over every row; the monthly average only over the
//! month anchor rows selected by an [`AnchorRule`].

pub mod monthly;
pub mod sma;

pub use monthly::{anchor_rows, compute_monthly, AnchorRule, MonthlySma};
pub use sma::{compute_daily, DailySma};

use crate::domain::{MovingAverageSpec, PeriodType, StockSeries};

/// A moving average that can be computed over a series.
///
/// # Look-ahead guard
/// No value at row t may depend on rows after t: truncating the series after
/// row t must leave values 0..=t unchanged.
pub trait Indicator: Send + Sync {
    /// Short machine name, e.g. "sma_200d".
    fn name(&self) -> &str;

    /// Samples needed before the first value appears.
    fn lookback(&self) -> usize;

    /// One entry per row of `series`, ascending by date.
    fn compute(&self, series: &StockSeries) -> Vec<Option<f64>>;
}

/// Build the indicator for a configured spec.
pub fn indicator_for(spec: &MovingAverageSpec, anchor_rule: AnchorRule) -> Box<dyn Indicator> {
    match spec.period_type {
        PeriodType::Day => Box::new(DailySma::new(spec.period)),
        PeriodType::Month => Box::new(MonthlySma::new(spec.period, anchor_rule)),
    }
}

/// Computed averages for one spec, aligned to series rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageColumn {
    pub spec_index: usize,
    pub values: Vec<Option<f64>>,
}

impl MovingAverageColumn {
    /// Newest row carrying a value, with that value.
    pub fn latest(&self) -> Option<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, v)| v.map(|v| (i, v)))
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Compute every configured average for one series, in spec order.
pub fn compute_all(
    series: &StockSeries,
    specs: &[MovingAverageSpec],
    anchor_rule: AnchorRule,
) -> Vec<MovingAverageColumn> {
    specs
        .iter()
        .enumerate()
        .map(|(spec_index, spec)| MovingAverageColumn {
            spec_index,
            values: indicator_for(spec, anchor_rule).compute(series),
        })
        .collect()
}

/// Rolling arithmetic mean; index i holds the mean of `values[i+1-period..=i]`.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    for i in period..n {
        sum = sum - values[i - period] + values[i];
        result[i] = Some(sum / period as f64);
    }

    result
}

/// Build a series from adjusted closes on consecutive weekdays starting 2024-01-02.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> StockSeries {
    use crate::domain::{PriceObservation, ADJUSTED_CLOSE};
    use chrono::{Datelike, Weekday};

    let mut date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let mut observations = Vec::with_capacity(closes.len());
    for &close in closes {
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date = date.succ_opt().unwrap();
        }
        observations.push(PriceObservation::new(date, vec![Some(close)]));
        date = date.succ_opt().unwrap();
    }
    StockSeries::new("TEST", vec![ADJUSTED_CLOSE.to_string()], observations).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;
