//! Monthly Simple Moving Average.
//!
//! One sample per calendar month (the anchor row), averaged over `period`
//! consecutive anchors. The anchor for a month is chosen by [`AnchorRule`];
//! non-anchor rows never carry a monthly value.

use super::{rolling_mean, Indicator};
use crate::domain::StockSeries;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Which row represents a calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorRule {
    /// First trading row of each month in ascending order.
    #[default]
    FirstOfMonth,
    /// Last trading row before the month changes.
    LastOfMonth,
}

/// Row indices (ascending) of the anchor row for every distinct month.
pub fn anchor_rows(series: &StockSeries, rule: AnchorRule) -> Vec<usize> {
    let obs = series.observations();
    let month_of = |i: usize| (obs[i].date.year(), obs[i].date.month());

    (0..obs.len())
        .filter(|&i| match rule {
            AnchorRule::FirstOfMonth => i == 0 || month_of(i) != month_of(i - 1),
            AnchorRule::LastOfMonth => i + 1 == obs.len() || month_of(i) != month_of(i + 1),
        })
        .collect()
}

/// Monthly SMA: the anchor at position k gets the mean of anchors k+1-period..=k.
///
/// The result has one entry per series row; only anchor rows may be `Some`.
pub fn compute_monthly(series: &StockSeries, anchors: &[usize], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; series.len()];
    let samples: Vec<f64> = anchors
        .iter()
        .filter_map(|&row| series.get(row).and_then(|o| o.adjusted_close()))
        .collect();
    if samples.len() != anchors.len() {
        return result;
    }

    for (&row, mean) in anchors.iter().zip(rolling_mean(&samples, period)) {
        result[row] = mean;
    }
    result
}

#[derive(Debug, Clone)]
pub struct MonthlySma {
    period: usize,
    anchor_rule: AnchorRule,
    name: String,
}

impl MonthlySma {
    pub fn new(period: usize, anchor_rule: AnchorRule) -> Self {
        Self {
            period,
            anchor_rule,
            name: format!("sma_{period}m"),
        }
    }
}

impl Indicator for MonthlySma {
    fn name(&self) -> &str {
        &self.name
    }

    /// Counted in anchors, not rows.
    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, series: &StockSeries) -> Vec<Option<f64>> {
        let anchors = anchor_rows(series, self.anchor_rule);
        compute_monthly(series, &anchors, self.period)
    }
}
