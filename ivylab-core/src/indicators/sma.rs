//! Daily Simple Moving Average.
//!
//! Rolling mean of the adjusted close over `period` trading days.
//! Lookback: period - 1 (first value at row period-1).

use super::{rolling_mean, Indicator};
use crate::domain::StockSeries;

/// Daily SMA over every row of the series.
pub fn compute_daily(series: &StockSeries, period: usize) -> Vec<Option<f64>> {
    rolling_mean(&series.adjusted_closes(), period)
}

#[derive(Debug, Clone)]
pub struct DailySma {
    period: usize,
    name: String,
}

impl DailySma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("sma_{period}d"),
        }
    }
}

impl Indicator for DailySma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, series: &StockSeries) -> Vec<Option<f64>> {
        compute_daily(series, self.period)
    }
}
