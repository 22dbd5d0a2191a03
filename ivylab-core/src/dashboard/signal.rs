//! Position and variance derivation.
//!
//! Variance is the percentage distance of the adjusted close from a moving
//! average, rounded to 2 decimals (the only rounding in the pipeline).
//! A positive variance means "Invested", anything else "Cash".

use crate::workbook::{CellRef, StyleTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Variance above this is a buy signal.
pub const BUY_THRESHOLD: f64 = 2.0;
/// Variance below this is a sell signal.
pub const SELL_THRESHOLD: f64 = -2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Invested,
    Cash,
}

impl Position {
    pub fn from_variance(variance: f64) -> Self {
        if variance > 0.0 {
            Position::Invested
        } else {
            Position::Cash
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Position::Invested => "Invested",
            Position::Cash => "Cash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarianceBand {
    Buy,
    Neutral,
    Sell,
}

impl VarianceBand {
    pub fn from_variance(variance: f64) -> Self {
        if variance > BUY_THRESHOLD {
            VarianceBand::Buy
        } else if variance < SELL_THRESHOLD {
            VarianceBand::Sell
        } else {
            VarianceBand::Neutral
        }
    }

    /// Highlight applied to a variance cell in this band.
    pub fn style(self) -> StyleTag {
        match self {
            VarianceBand::Buy => StyleTag::Buy,
            VarianceBand::Neutral => StyleTag::Neutral,
            VarianceBand::Sell => StyleTag::Sell,
        }
    }
}

/// Significant digits a spreadsheet keeps before rounding.
const SIGNIFICANT_DIGITS: usize = 15;

/// Round half away from zero to 2 decimals, like a spreadsheet ROUND(x, 2).
///
/// The value is first taken to 15 significant decimal digits and rounded on
/// those digits, so `1.005` becomes `1.01` even though its nearest binary
/// value sits just below the midpoint.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    // "d.dddddddddddddde<exp>"
    let text = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value.abs());
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return (value * 100.0).round() / 100.0;
    };
    let digits = mantissa.replace('.', "").parse::<u64>();
    let (Ok(digits), Ok(exponent)) = (digits, exponent.parse::<i32>()) else {
        return (value * 100.0).round() / 100.0;
    };

    // value * 100 == digits * 10^shift
    let shift = exponent - (SIGNIFICANT_DIGITS as i32 - 1) + 2;
    if shift >= 0 {
        return value;
    }
    let drop = shift.unsigned_abs();
    if drop > SIGNIFICANT_DIGITS as u32 {
        return 0.0;
    }
    let divisor = 10u64.pow(drop);
    let mut hundredths = digits / divisor;
    if (digits % divisor) * 2 >= divisor {
        hundredths += 1;
    }
    let rounded = hundredths as f64 / 100.0;
    if value < 0.0 && hundredths > 0 {
        -rounded
    } else {
        rounded
    }
}

/// `round((close - average) / average * 100, 2)`; `None` for a zero or
/// non-finite average.
pub fn variance_percent(adjusted_close: f64, average: f64) -> Option<f64> {
    if average == 0.0 || !average.is_finite() || !adjusted_close.is_finite() {
        return None;
    }
    Some(round2((adjusted_close - average) / average * 100.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub variance: f64,
    pub position: Position,
}

impl Signal {
    pub fn derive(adjusted_close: f64, average: f64) -> Option<Self> {
        let variance = variance_percent(adjusted_close, average)?;
        Some(Self {
            variance,
            position: Position::from_variance(variance),
        })
    }

    pub fn band(&self) -> VarianceBand {
        VarianceBand::from_variance(self.variance)
    }
}

/// Where a signal's inputs live on a data sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSource {
    pub sheet: String,
    pub close_cell: CellRef,
    pub average_cell: CellRef,
    pub adjusted_close: f64,
    pub average: f64,
    pub as_of: NaiveDate,
}

impl SignalSource {
    pub fn signal(&self) -> Option<Signal> {
        Signal::derive(self.adjusted_close, self.average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_average_is_invested() {
        let s = Signal::derive(105.0, 100.0).unwrap();
        assert_eq!(s.variance, 5.0);
        assert_eq!(s.position, Position::Invested);

        let s = Signal::derive(110.0, 100.0).unwrap();
        assert_eq!(s.variance, 10.0);
        assert_eq!(s.position, Position::Invested);
    }

    #[test]
    fn below_average_is_cash() {
        let s = Signal::derive(95.0, 100.0).unwrap();
        assert_eq!(s.variance, -5.0);
        assert_eq!(s.position, Position::Cash);
    }

    #[test]
    fn exactly_on_average_is_cash() {
        let s = Signal::derive(100.0, 100.0).unwrap();
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.position, Position::Cash);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(variance_percent(100.0, 3.0), Some(3233.33));
        assert_eq!(variance_percent(103.456, 100.0), Some(3.46));
    }

    #[test]
    fn midpoints_round_away_from_zero_on_decimal_digits() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(-1.005), -1.01);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.004999), 1.0);
        assert_eq!(round2(12345.0), 12345.0);
        assert_eq!(round2(0.0000001), 0.0);
    }

    #[test]
    fn tiny_positive_variance_rounds_to_zero_and_is_cash() {
        let s = Signal::derive(100.001, 100.0).unwrap();
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.position, Position::Cash);
    }

    #[test]
    fn zero_average_has_no_signal() {
        assert_eq!(Signal::derive(1.0, 0.0), None);
        assert_eq!(Signal::derive(f64::NAN, 1.0), None);
    }

    #[test]
    fn bands() {
        assert_eq!(VarianceBand::from_variance(2.01), VarianceBand::Buy);
        assert_eq!(VarianceBand::from_variance(2.0), VarianceBand::Neutral);
        assert_eq!(VarianceBand::from_variance(-2.0), VarianceBand::Neutral);
        assert_eq!(VarianceBand::from_variance(-2.01), VarianceBand::Sell);
        assert_eq!(Signal::derive(103.0, 100.0).unwrap().band(), VarianceBand::Buy);
        assert_eq!(VarianceBand::Sell.style(), StyleTag::Sell);
    }
}
