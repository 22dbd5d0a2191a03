//! Domain types for IvyLab

pub mod moving_average;
pub mod observation;
pub mod series;

pub use moving_average::{Algorithm, MovingAverageSpec, PeriodType, SpecError};
pub use observation::PriceObservation;
pub use series::{is_adjusted_close, SeriesError, StockSeries, ADJUSTED_CLOSE};

/// Symbol type alias
pub type Symbol = String;
