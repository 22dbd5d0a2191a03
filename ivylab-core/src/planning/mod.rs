//! Up-front planning: which dates to fetch and where every cell goes.

pub mod columns;
pub mod date_range;
pub mod layout;

pub use columns::{ColumnRole, DashboardColumn, DataColumnMap};
pub use date_range::{plan as plan_date_range, plan_now, DateRange, LOOKBACK_MONTHS};
pub use layout::{plan_regions, region_height, DashboardLayout, DashboardRowRegion};
