//! Look-ahead contamination tests for the moving averages.
//!
//! No value at row t may depend on rows after t. Compute on a truncated
//! series and on the full series; values before the cut must match.

use chrono::{Datelike, NaiveDate};
use ivylab_core::domain::{MovingAverageSpec, PriceObservation, StockSeries, ADJUSTED_CLOSE};
use ivylab_core::indicators::{indicator_for, AnchorRule, Indicator};

/// Deterministic pseudo-random walk on weekdays-and-weekends alike.
fn make_series(n: usize) -> StockSeries {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut price = 100.0;
    let observations = (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            price += ((seed % 200) as f64 - 100.0) * 0.05;
            price = f64::max(price, 10.0);
            PriceObservation::new(base + chrono::Days::new(i as u64), vec![Some(price)])
        })
        .collect();
    StockSeries::new("TEST", vec![ADJUSTED_CLOSE.to_string()], observations).unwrap()
}

fn truncate(series: &StockSeries, len: usize) -> StockSeries {
    StockSeries::new(
        series.symbol(),
        series.columns().to_vec(),
        series.observations()[..len].to_vec(),
    )
    .unwrap()
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &StockSeries, cut: usize) {
    let full_values = indicator.compute(full);
    let cut_values = indicator.compute(&truncate(full, cut));
    for i in 0..cut {
        assert_eq!(
            full_values[i], cut_values[i],
            "{} leaks future data at row {i}",
            indicator.name()
        );
    }
}

#[test]
fn daily_sma_has_no_lookahead() {
    let series = make_series(400);
    for period in [1, 5, 50, 200] {
        let ind = indicator_for(&MovingAverageSpec::daily(period), AnchorRule::FirstOfMonth);
        assert_no_lookahead(ind.as_ref(), &series, 250);
    }
}

#[test]
fn first_of_month_sma_has_no_lookahead() {
    let series = make_series(900);
    let ind = indicator_for(&MovingAverageSpec::monthly(10), AnchorRule::FirstOfMonth);
    assert_no_lookahead(ind.as_ref(), &series, 500);
}

#[test]
fn last_of_month_sma_only_shifts_at_the_cut() {
    // The last row of a truncated series is a provisional anchor, so only
    // rows before the cut's month are compared.
    let series = make_series(900);
    let ind = indicator_for(&MovingAverageSpec::monthly(10), AnchorRule::LastOfMonth);
    let full = ind.compute(&series);
    let cut = ind.compute(&truncate(&series, 500));
    let month_start = (0..500)
        .rev()
        .find(|&i| {
            let obs = series.observations();
            i == 0 || (obs[i].date.year(), obs[i].date.month())
                != (obs[i - 1].date.year(), obs[i - 1].date.month())
        })
        .unwrap();
    assert_eq!(full[..month_start], cut[..month_start]);
}
