//! Dashboard layout planning.
//!
//! Every moving-average spec gets one signal table on the dashboard. The
//! tables are stacked top to bottom in configuration order; each occupies
//! `symbol_count + 4` rows:
//!
//! ```text
//! header_row        merged title
//! header_row + 1    Fund | Position | Variance
//! body_start_row    first symbol
//! ...
//! body_end_row      (blank separator)
//! footer_row        merged caption
//! ```
//!
//! Rows are 0-based sheet indices. The layout is computed once, before any
//! cell is written, and is read-only afterwards.

use crate::domain::MovingAverageSpec;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Title row plus column-label row.
pub const HEADER_ROWS: usize = 2;
/// Blank separator plus caption row.
pub const FOOTER_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRowRegion {
    pub moving_average_index: usize,
    pub header_row: usize,
    pub body_start_row: usize,
    /// Exclusive.
    pub body_end_row: usize,
    pub footer_row: usize,
}

impl DashboardRowRegion {
    pub fn title_row(&self) -> usize {
        self.header_row
    }

    pub fn label_row(&self) -> usize {
        self.header_row + 1
    }

    /// Sheet row for the symbol at `offset` within the body.
    pub fn body_row(&self, offset: usize) -> Option<usize> {
        let row = self.body_start_row + offset;
        (row < self.body_end_row).then_some(row)
    }

    pub fn body_len(&self) -> usize {
        self.body_end_row - self.body_start_row
    }

    /// All rows owned by the region, header through footer.
    pub fn rows(&self) -> Range<usize> {
        self.header_row..self.footer_row + 1
    }

    pub fn height(&self) -> usize {
        self.footer_row + 1 - self.header_row
    }
}

/// Row height of a single table for `symbol_count` symbols.
pub fn region_height(symbol_count: usize) -> usize {
    HEADER_ROWS + symbol_count + FOOTER_ROWS
}

/// The planned dashboard: one region per spec plus the legend position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLayout {
    pub symbol_count: usize,
    pub regions: Vec<DashboardRowRegion>,
}

impl DashboardLayout {
    pub fn plan(symbol_count: usize, specs: &[MovingAverageSpec]) -> Self {
        Self {
            symbol_count,
            regions: plan_regions(symbol_count, specs.len()),
        }
    }

    /// First row below the last table (where the legend begins).
    pub fn legend_start_row(&self) -> usize {
        self.regions.last().map(|r| r.footer_row + 1).unwrap_or(0)
    }

    pub fn region(&self, moving_average_index: usize) -> Option<&DashboardRowRegion> {
        self.regions.get(moving_average_index)
    }
}

/// Stack `table_count` regions with no gap between them.
pub fn plan_regions(symbol_count: usize, table_count: usize) -> Vec<DashboardRowRegion> {
    let height = region_height(symbol_count);
    (0..table_count)
        .map(|i| {
            let header_row = i * height;
            let body_start_row = header_row + HEADER_ROWS;
            let body_end_row = body_start_row + symbol_count;
            DashboardRowRegion {
                moving_average_index: i,
                header_row,
                body_start_row,
                body_end_row,
                footer_row: body_end_row + FOOTER_ROWS - 1,
            }
        })
        .collect()
}
