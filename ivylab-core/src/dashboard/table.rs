//! Signal table rendering for one dashboard region.
//!
//! Position and Variance are emitted as formulas referencing the data
//! sheets, so the spreadsheet recomputes them. Each formula also carries the
//! value computed here as its cached result.

use super::signal::{Position, Signal, SignalSource};
use crate::planning::{DashboardColumn, DashboardRowRegion};
use crate::workbook::{CellRange, CellRef, CellValue, Sheet, StyleTag, WorkbookError};
use serde::{Deserialize, Serialize};

/// Placeholder for signals that cannot be derived.
pub const NOT_AVAILABLE: &str = "N/A";

/// What was written for one symbol in one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub row: usize,
    pub symbol: String,
    pub position_expression: Option<String>,
    pub variance_expression: Option<String>,
    pub signal: Option<Signal>,
}

pub fn footer_caption(title: &str) -> String {
    format!("* Percent above/below the {title}")
}

fn cell(row: usize, column: DashboardColumn) -> CellRef {
    CellRef::new(row, column.index())
}

fn span(row: usize) -> CellRange {
    CellRange::row_span(
        row,
        DashboardColumn::Fund.index(),
        DashboardColumn::Variance.index(),
    )
}

/// Header block, one Fund cell per symbol, and the footer caption.
pub fn render_table(
    sheet: &mut Sheet,
    region: &DashboardRowRegion,
    title: &str,
    symbols: &[String],
) -> Result<(), WorkbookError> {
    sheet.set(
        cell(region.title_row(), DashboardColumn::Fund),
        CellValue::text(title),
        Some(StyleTag::TableTitle),
    )?;
    sheet.merge(span(region.title_row()))?;

    for column in DashboardColumn::ALL {
        sheet.set(
            cell(region.label_row(), column),
            CellValue::text(column.label()),
            Some(StyleTag::ColumnLabel),
        )?;
    }

    for (offset, symbol) in symbols.iter().enumerate() {
        let Some(row) = region.body_row(offset) else {
            break;
        };
        sheet.set(
            cell(row, DashboardColumn::Fund),
            CellValue::text(symbol.as_str()),
            Some(StyleTag::Symbol),
        )?;
    }

    sheet.set(
        cell(region.footer_row, DashboardColumn::Fund),
        CellValue::Text(footer_caption(title)),
        Some(StyleTag::Caption),
    )?;
    sheet.merge(span(region.footer_row))?;
    Ok(())
}

/// `ROUND((close - average) / average * 100, 2)` with sheet-qualified refs.
pub fn variance_expression(source: &SignalSource) -> String {
    let close = source.close_cell.on_sheet(&source.sheet);
    let average = source.average_cell.on_sheet(&source.sheet);
    format!("ROUND(({close}-{average})/{average}*100,2)")
}

/// `IF(variance > 0, "Invested", "Cash")` against the same-row variance cell.
pub fn position_expression(variance_cell: CellRef) -> String {
    format!(
        "IF({variance_cell}>0,\"{}\",\"{}\")",
        Position::Invested.label(),
        Position::Cash.label()
    )
}

/// Position and Variance for the symbol at `row_offset`.
///
/// Without a source (no moving-average value yet) both cells read "N/A".
pub fn render_row(
    sheet: &mut Sheet,
    region: &DashboardRowRegion,
    row_offset: usize,
    symbol: &str,
    source: Option<&SignalSource>,
) -> Result<Option<SignalRow>, WorkbookError> {
    let Some(row) = region.body_row(row_offset) else {
        return Ok(None);
    };
    let position_cell = cell(row, DashboardColumn::Position);
    let variance_cell = cell(row, DashboardColumn::Variance);

    let signal = source.and_then(SignalSource::signal);
    let (Some(source), Some(signal)) = (source, signal) else {
        sheet.set(position_cell, CellValue::text(NOT_AVAILABLE), None)?;
        sheet.set(variance_cell, CellValue::text(NOT_AVAILABLE), None)?;
        return Ok(Some(SignalRow {
            row,
            symbol: symbol.to_string(),
            position_expression: None,
            variance_expression: None,
            signal: None,
        }));
    };

    let variance_expr = variance_expression(source);
    let position_expr = position_expression(variance_cell);
    sheet.set(
        variance_cell,
        CellValue::formula(variance_expr.clone(), CellValue::Number(signal.variance)),
        Some(StyleTag::Percent),
    )?;
    sheet.set(
        position_cell,
        CellValue::formula(position_expr.clone(), CellValue::text(signal.position.label())),
        None,
    )?;

    Ok(Some(SignalRow {
        row,
        symbol: symbol.to_string(),
        position_expression: Some(position_expr),
        variance_expression: Some(variance_expr),
        signal: Some(signal),
    }))
}
