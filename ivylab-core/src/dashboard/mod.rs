//! Dashboard assembly.
//!
//! [`DashboardBuilder`] plans the layout once, renders every table frame up
//! front, then accepts one symbol at a time in configuration order. Nothing
//! is positioned by a running cursor: every write goes through the planned
//! [`DashboardRowRegion`](crate::planning::DashboardRowRegion) list.

pub mod data_sheet;
pub mod signal;
pub mod table;

pub use data_sheet::{render_data_sheet, DataSheet};
pub use signal::{
    round2, variance_percent, Position, Signal, SignalSource, VarianceBand, BUY_THRESHOLD,
    SELL_THRESHOLD,
};
pub use table::{render_row, render_table, SignalRow, NOT_AVAILABLE};

use crate::domain::MovingAverageSpec;
use crate::planning::{DashboardColumn, DashboardLayout};
use crate::workbook::{
    sanitize_defined_name, sanitize_sheet_name, CellRange, CellRef, CellValue, ConditionalFormat,
    DefinedName, FormatRule, Sheet, SheetKind, StyleTag, Workbook, WorkbookError,
};
use std::collections::HashSet;
use thiserror::Error;

pub const DASHBOARD_SHEET: &str = "Dashboard";
pub const CHARTS_SHEET: &str = "Charts";
pub const LEGEND_NAME: &str = "Legend";

#[derive(Debug, Error, PartialEq)]
pub enum DashboardError {
    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    #[error("symbol index {index} out of range for {count} symbols")]
    SymbolOutOfRange { index: usize, count: usize },

    #[error("expected {expected} signal sources, got {actual}")]
    SourceCount { expected: usize, actual: usize },

    #[error("symbol '{symbol}' needs sheet name '{sheet}', which is already taken")]
    SheetNameTaken { symbol: String, sheet: String },
}

/// Data-sheet name for each symbol, in order.
///
/// Names are compared case-insensitively against each other and against the
/// dashboard and charts sheets.
pub fn data_sheet_names(symbols: &[String]) -> Result<Vec<String>, DashboardError> {
    let mut taken: HashSet<String> = [DASHBOARD_SHEET, CHARTS_SHEET]
        .iter()
        .map(|s| s.to_ascii_lowercase())
        .collect();
    let mut names = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let sheet = sanitize_sheet_name(symbol);
        if !taken.insert(sheet.to_ascii_lowercase()) {
            return Err(DashboardError::SheetNameTaken {
                symbol: symbol.clone(),
                sheet,
            });
        }
        names.push(sheet);
    }
    Ok(names)
}

/// Builds the dashboard sheet for one document.
#[derive(Debug, Clone)]
pub struct DashboardBuilder {
    layout: DashboardLayout,
    titles: Vec<String>,
    symbols: Vec<String>,
    sheet: Sheet,
}

impl DashboardBuilder {
    /// Plan the layout and render every table frame.
    pub fn new(symbols: &[String], specs: &[MovingAverageSpec]) -> Result<Self, DashboardError> {
        data_sheet_names(symbols)?;
        let layout = DashboardLayout::plan(symbols.len(), specs);
        let titles: Vec<String> = specs.iter().map(MovingAverageSpec::display_title).collect();
        let mut sheet = Sheet::new(DASHBOARD_SHEET, SheetKind::Dashboard);
        sheet.set_column_width(DashboardColumn::Fund.index(), 16.0);
        sheet.set_column_width(DashboardColumn::Position.index(), 12.0);
        sheet.set_column_width(DashboardColumn::Variance.index(), 12.0);

        for (region, title) in layout.regions.iter().zip(&titles) {
            render_table(&mut sheet, region, title, symbols)?;
        }

        Ok(Self {
            layout,
            titles,
            symbols: symbols.to_vec(),
            sheet,
        })
    }

    pub fn layout(&self) -> &DashboardLayout {
        &self.layout
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Fill the symbol's row in every table; `sources[k]` feeds table k.
    pub fn add_symbol(
        &mut self,
        symbol_index: usize,
        sources: &[Option<SignalSource>],
    ) -> Result<Vec<SignalRow>, DashboardError> {
        let symbol = self
            .symbols
            .get(symbol_index)
            .ok_or(DashboardError::SymbolOutOfRange {
                index: symbol_index,
                count: self.symbols.len(),
            })?
            .clone();
        if sources.len() != self.layout.regions.len() {
            return Err(DashboardError::SourceCount {
                expected: self.layout.regions.len(),
                actual: sources.len(),
            });
        }

        let mut rows = Vec::with_capacity(sources.len());
        for (region, source) in self.layout.regions.iter().zip(sources) {
            if let Some(row) =
                render_row(&mut self.sheet, region, symbol_index, &symbol, source.as_ref())?
            {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Apply conditional formats, write the legend, and return the sheet with
    /// its defined names. `descriptions` is aligned with the symbol list.
    pub fn finish(
        mut self,
        descriptions: &[Option<String>],
    ) -> Result<(Sheet, Vec<DefinedName>), DashboardError> {
        self.apply_conditional_formats();
        let legend = self.render_legend(descriptions)?;
        let names = self.defined_names(legend);
        Ok((self.sheet, names))
    }

    fn column_ranges(&self, column: DashboardColumn) -> Vec<CellRange> {
        self.layout
            .regions
            .iter()
            .filter(|r| r.body_len() > 0)
            .map(|r| CellRange::column_span(column.index(), r.body_start_row, r.body_end_row - 1))
            .collect()
    }

    fn apply_conditional_formats(&mut self) {
        let positions = self.column_ranges(DashboardColumn::Position);
        let variances = self.column_ranges(DashboardColumn::Variance);
        if positions.is_empty() {
            return;
        }

        let rules = [
            (
                &positions,
                FormatRule::TextEquals {
                    text: Position::Invested.label().into(),
                },
                StyleTag::Invested,
            ),
            (
                &positions,
                FormatRule::TextEquals {
                    text: Position::Cash.label().into(),
                },
                StyleTag::Cash,
            ),
            (
                &variances,
                FormatRule::GreaterThan { value: BUY_THRESHOLD },
                VarianceBand::Buy.style(),
            ),
            (
                &variances,
                FormatRule::Between { min: SELL_THRESHOLD, max: BUY_THRESHOLD },
                VarianceBand::Neutral.style(),
            ),
            (
                &variances,
                FormatRule::LessThan { value: SELL_THRESHOLD },
                VarianceBand::Sell.style(),
            ),
        ];
        for (ranges, rule, style) in rules {
            self.sheet.add_conditional_format(ConditionalFormat {
                ranges: ranges.clone(),
                rule,
                style,
            });
        }
    }

    /// Label row plus one row per symbol below the last table.
    fn render_legend(
        &mut self,
        descriptions: &[Option<String>],
    ) -> Result<Option<CellRange>, DashboardError> {
        if self.symbols.is_empty() {
            return Ok(None);
        }
        let start = self.layout.legend_start_row();
        let label = Some(StyleTag::ColumnLabel);
        self.sheet.set(CellRef::new(start, 0), CellValue::text("Fund"), label)?;
        self.sheet.set(CellRef::new(start, 1), CellValue::text("Description"), label)?;
        self.sheet.merge(CellRange::row_span(start, 1, 2))?;

        for (i, symbol) in self.symbols.iter().enumerate() {
            let row = start + 1 + i;
            let description = descriptions.get(i).cloned().flatten().unwrap_or_default();
            let fund = CellValue::text(symbol.as_str());
            self.sheet.set(CellRef::new(row, 0), fund, Some(StyleTag::Symbol))?;
            self.sheet.set(CellRef::new(row, 1), CellValue::Text(description), None)?;
            self.sheet.merge(CellRange::row_span(row, 1, 2))?;
        }

        Ok(Some(CellRange::new(
            CellRef::new(start + 1, 0),
            CellRef::new(start + self.symbols.len(), 1),
        )))
    }

    fn defined_names(&self, legend: Option<CellRange>) -> Vec<DefinedName> {
        let mut names: Vec<DefinedName> = Vec::new();
        let mut push = |base: String, range: CellRange| {
            let mut name = base.clone();
            let mut n = 2;
            while names.iter().any(|d| d.name.eq_ignore_ascii_case(&name)) {
                name = format!("{base}_{n}");
                n += 1;
            }
            names.push(DefinedName {
                name,
                sheet: DASHBOARD_SHEET.to_string(),
                range,
            });
        };

        for (region, title) in self.layout.regions.iter().zip(&self.titles) {
            if region.body_len() == 0 {
                continue;
            }
            let stem = sanitize_defined_name(title);
            for column in [DashboardColumn::Position, DashboardColumn::Variance] {
                let range = CellRange::column_span(
                    column.index(),
                    region.body_start_row,
                    region.body_end_row - 1,
                );
                push(format!("{stem}_{}", column.label()), range);
            }
        }
        if let Some(range) = legend {
            push(LEGEND_NAME.to_string(), range);
        }
        names
    }
}

/// Order sheets as dashboard, charts placeholder, then data sheets.
pub fn assemble_workbook(
    dashboard: Sheet,
    names: Vec<DefinedName>,
    data_sheets: Vec<Sheet>,
) -> Result<Workbook, WorkbookError> {
    let mut workbook = Workbook::new();
    workbook.push_sheet(dashboard)?;
    workbook.push_sheet(Sheet::new(CHARTS_SHEET, SheetKind::Charts))?;
    for sheet in data_sheets {
        workbook.push_sheet(sheet)?;
    }
    for name in names {
        workbook.define_name(name)?;
    }
    Ok(workbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn symbols() -> Vec<String> {
        vec!["VTI".into(), "VEU".into(), "IEF".into()]
    }

    fn specs() -> Vec<MovingAverageSpec> {
        vec![MovingAverageSpec::daily(200), MovingAverageSpec::monthly(10)]
    }

    fn source(sheet: &str, close: f64, average: f64) -> Option<SignalSource> {
        Some(SignalSource {
            sheet: sheet.into(),
            close_cell: CellRef::new(1, 1),
            average_cell: CellRef::new(1, 7),
            adjusted_close: close,
            average,
            as_of: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        })
    }

    fn built() -> (Sheet, Vec<DefinedName>) {
        let mut builder = DashboardBuilder::new(&symbols(), &specs()).unwrap();
        builder
            .add_symbol(0, &[source("VTI", 110.0, 100.0), source("VTI", 99.0, 100.0)])
            .unwrap();
        builder
            .add_symbol(1, &[source("VEU", 90.0, 100.0), None])
            .unwrap();
        builder
            .add_symbol(2, &[source("IEF", 101.0, 100.0), source("IEF", 104.0, 100.0)])
            .unwrap();
        builder
            .finish(&[Some("Total Market".into()), None, Some("7-10y Treasury".into())])
            .unwrap()
    }

    #[test]
    fn rows_land_in_their_regions() {
        let (sheet, _) = built();
        // region 0 body rows 2..5, region 1 body rows 9..12
        assert_eq!(sheet.get(2, 1).unwrap().value.as_text(), Some("Invested"));
        assert_eq!(sheet.get(3, 2).unwrap().value.as_number(), Some(-10.0));
        assert_eq!(sheet.get(9, 0).unwrap().value.as_text(), Some("VTI"));
        assert_eq!(sheet.get(9, 1).unwrap().value.as_text(), Some("Cash"));
        assert_eq!(sheet.get(10, 1).unwrap().value.as_text(), Some(NOT_AVAILABLE));
        assert_eq!(sheet.get(11, 2).unwrap().value.as_number(), Some(4.0));
    }

    #[test]
    fn conditional_formats_cover_all_regions() {
        let (sheet, _) = built();
        assert_eq!(sheet.conditional_formats.len(), 5);
        let position_ranges: Vec<String> = sheet.conditional_formats[0]
            .ranges
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(position_ranges, vec!["B3:B5", "B10:B12"]);
        assert_eq!(sheet.effective_style(CellRef::new(2, 1)), Some(StyleTag::Invested));
        assert_eq!(sheet.effective_style(CellRef::new(3, 1)), Some(StyleTag::Cash));
        assert_eq!(sheet.effective_style(CellRef::new(2, 2)), Some(StyleTag::Buy));
        assert_eq!(sheet.effective_style(CellRef::new(4, 2)), Some(StyleTag::Neutral));
        assert_eq!(sheet.effective_style(CellRef::new(3, 2)), Some(StyleTag::Sell));
        // highlight agrees with the band of the cached variance
        for (row, close) in [(2, 110.0), (3, 90.0), (4, 101.0)] {
            let band = Signal::derive(close, 100.0).unwrap().band();
            assert_eq!(sheet.effective_style(CellRef::new(row, 2)), Some(band.style()));
        }
    }

    #[test]
    fn legend_below_last_table() {
        let (sheet, names) = built();
        // two regions of 7 rows each
        assert_eq!(sheet.get(14, 0).unwrap().value.as_text(), Some("Fund"));
        assert_eq!(sheet.get(15, 1).unwrap().value.as_text(), Some("Total Market"));
        assert_eq!(sheet.get(16, 0).unwrap().value.as_text(), Some("VEU"));
        assert_eq!(sheet.get(16, 1).unwrap().value.as_text(), Some(""));
        let legend = names.iter().find(|n| n.name == LEGEND_NAME).unwrap();
        assert_eq!(legend.target(), "Dashboard!A16:B18");
    }

    #[test]
    fn defined_names_per_region() {
        let (_, names) = built();
        let listed: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            listed,
            vec![
                "_200_Day_SMA_Position",
                "_200_Day_SMA_Variance",
                "_10_Month_SMA_Position",
                "_10_Month_SMA_Variance",
                "Legend"
            ]
        );
    }

    #[test]
    fn duplicate_titles_get_unique_names() {
        let specs = vec![MovingAverageSpec::daily(50), MovingAverageSpec::daily(50)];
        let builder = DashboardBuilder::new(&["A".to_string()], &specs).unwrap();
        let (_, names) = builder.finish(&[]).unwrap();
        assert_eq!(names[2].name, "_50_Day_SMA_Position_2");
    }

    #[test]
    fn add_symbol_validates_inputs() {
        let mut builder = DashboardBuilder::new(&symbols(), &specs()).unwrap();
        assert!(matches!(
            builder.add_symbol(3, &[None, None]),
            Err(DashboardError::SymbolOutOfRange { .. })
        ));
        assert!(matches!(
            builder.add_symbol(0, &[None]),
            Err(DashboardError::SourceCount { .. })
        ));
    }

    #[test]
    fn empty_document_dashboard() {
        let builder = DashboardBuilder::new(&[], &specs()).unwrap();
        let (sheet, names) = builder.finish(&[]).unwrap();
        assert!(sheet.conditional_formats.is_empty());
        assert!(names.is_empty());
        assert_eq!(sheet.merges.len(), 4);
    }

    #[test]
    fn symbols_colliding_with_sheet_names_are_rejected() {
        let charts = vec!["VTI".to_string(), "charts".to_string()];
        assert_eq!(
            DashboardBuilder::new(&charts, &specs()).unwrap_err(),
            DashboardError::SheetNameTaken {
                symbol: "charts".into(),
                sheet: "charts".into()
            }
        );

        let slashes = vec!["BRK/B".to_string(), "BRK:B".to_string()];
        assert!(matches!(
            data_sheet_names(&slashes),
            Err(DashboardError::SheetNameTaken { ref sheet, .. }) if sheet == "BRK_B"
        ));

        let long = vec![format!("{}A", "X".repeat(31)), format!("{}B", "X".repeat(31))];
        assert!(data_sheet_names(&long).is_err());

        let fine = vec!["BRK/B".to_string(), "VTI".to_string()];
        assert_eq!(data_sheet_names(&fine).unwrap(), vec!["BRK_B", "VTI"]);
    }

    #[test]
    fn workbook_sheet_order() {
        let (dashboard, names) = built();
        let data = vec![
            Sheet::new("VTI", SheetKind::Data),
            Sheet::new("VEU", SheetKind::Data),
        ];
        let wb = assemble_workbook(dashboard, names, data).unwrap();
        let order: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(order, vec!["Dashboard", "Charts", "VTI", "VEU"]);
        assert_eq!(wb.defined_names.len(), 5);
    }
}
