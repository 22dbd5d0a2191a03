//! Per-symbol data sheet rendering.
//!
//! Row 0 holds column titles; rows 1..=n hold observations newest first, so
//! the latest close is always on row 2 in A1 terms. Moving-average columns
//! follow the price fields in spec order and stay blank where the engine has
//! no value.

use super::signal::SignalSource;
use crate::domain::{MovingAverageSpec, StockSeries};
use crate::indicators::MovingAverageColumn;
use crate::planning::{ColumnRole, DataColumnMap};
use crate::workbook::{
    sanitize_sheet_name, CellRef, CellValue, Sheet, SheetKind, StyleTag, WorkbookError,
};

/// A rendered data sheet plus, per spec, where its newest signal inputs sit.
#[derive(Debug, Clone)]
pub struct DataSheet {
    pub sheet: Sheet,
    pub columns: DataColumnMap,
    pub sources: Vec<Option<SignalSource>>,
}

/// Sheet row (0-based, header at 0) of series row `index`.
pub fn sheet_row(series_len: usize, index: usize) -> usize {
    series_len - index
}

pub fn render_data_sheet(
    series: &StockSeries,
    specs: &[MovingAverageSpec],
    averages: &[MovingAverageColumn],
) -> Result<DataSheet, WorkbookError> {
    let name = sanitize_sheet_name(series.symbol());
    let columns = DataColumnMap::new(series.columns().len(), specs.len());
    let mut sheet = Sheet::new(name.clone(), SheetKind::Data);

    for role in columns.roles() {
        let Some(col) = columns.index(role) else {
            continue;
        };
        let title = match role {
            ColumnRole::Date => "Date".to_string(),
            ColumnRole::Field(i) => series.columns()[i].clone(),
            ColumnRole::MovingAverage(k) => specs[k].display_title(),
        };
        sheet.set(CellRef::new(0, col), CellValue::Text(title), Some(StyleTag::ColumnLabel))?;
        sheet.set_column_width(col, if col == 0 { 12.0 } else { 14.0 });
    }

    let n = series.len();
    for (index, obs) in series.observations().iter().enumerate() {
        let row = sheet_row(n, index);
        if let Some(col) = columns.index(ColumnRole::Date) {
            sheet.set(CellRef::new(row, col), CellValue::Date(obs.date), Some(StyleTag::Date))?;
        }
        for field in 0..series.columns().len() {
            let (Some(col), Some(value)) =
                (columns.index(ColumnRole::Field(field)), series.value(index, field))
            else {
                continue;
            };
            sheet.set(CellRef::new(row, col), CellValue::Number(value), Some(StyleTag::Price))?;
        }
        for average in averages {
            let Some(col) = columns.index(ColumnRole::MovingAverage(average.spec_index)) else {
                continue;
            };
            if let Some(Some(value)) = average.values.get(index) {
                let cell = CellValue::Number(*value);
                sheet.set(CellRef::new(row, col), cell, Some(StyleTag::Price))?;
            }
        }
    }

    let sources = (0..specs.len())
        .map(|k| {
            let average = averages.iter().find(|a| a.spec_index == k)?;
            signal_source(series, &name, &columns, average)
        })
        .collect();

    Ok(DataSheet {
        sheet,
        columns,
        sources,
    })
}

/// Newest row carrying an average for `average`, as a signal source.
fn signal_source(
    series: &StockSeries,
    sheet_name: &str,
    columns: &DataColumnMap,
    average: &MovingAverageColumn,
) -> Option<SignalSource> {
    let (index, value) = average.latest()?;
    let obs = series.get(index)?;
    let row = sheet_row(series.len(), index);
    let close_col = columns.index(ColumnRole::ADJUSTED_CLOSE)?;
    let average_col = columns.index(ColumnRole::MovingAverage(average.spec_index))?;
    Some(SignalSource {
        sheet: sheet_name.to_string(),
        close_cell: CellRef::new(row, close_col),
        average_cell: CellRef::new(row, average_col),
        adjusted_close: obs.adjusted_close()?,
        average: value,
        as_of: obs.date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{compute_all, make_series, AnchorRule};

    #[test]
    fn newest_first_with_average_columns() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0]);
        let specs = vec![MovingAverageSpec::daily(2), MovingAverageSpec::daily(10)];
        let averages = compute_all(&series, &specs, AnchorRule::FirstOfMonth);
        let data = render_data_sheet(&series, &specs, &averages).unwrap();
        let sheet = &data.sheet;

        assert_eq!(sheet.name, "TEST");
        assert_eq!(sheet.get(0, 0).unwrap().value, CellValue::text("Date"));
        assert_eq!(sheet.get(0, 2).unwrap().value, CellValue::text("2 Day SMA"));
        assert_eq!(sheet.get(0, 3).unwrap().value, CellValue::text("10 Day SMA"));
        // newest close first
        assert_eq!(sheet.get(1, 1).unwrap().value, CellValue::Number(4.0));
        assert_eq!(sheet.get(4, 1).unwrap().value, CellValue::Number(1.0));
        // 2-day average present except on the oldest row
        assert_eq!(sheet.get(1, 2).unwrap().value, CellValue::Number(3.5));
        assert!(sheet.get(4, 2).is_none());
        // 10-day average never present
        assert!((1..=4).all(|r| sheet.get(r, 3).is_none()));
    }

    #[test]
    fn sources_point_at_latest_average() {
        let series = make_series(&[1.0, 2.0, 3.0, 4.0]);
        let specs = vec![MovingAverageSpec::daily(2), MovingAverageSpec::daily(10)];
        let averages = compute_all(&series, &specs, AnchorRule::FirstOfMonth);
        let data = render_data_sheet(&series, &specs, &averages).unwrap();

        let source = data.sources[0].as_ref().unwrap();
        assert_eq!(source.close_cell.to_string(), "B2");
        assert_eq!(source.average_cell.to_string(), "C2");
        assert_eq!(source.adjusted_close, 4.0);
        assert_eq!(source.average, 3.5);
        assert!(data.sources[1].is_none());
    }

    #[test]
    fn sheet_rows_reverse_series() {
        assert_eq!(sheet_row(10, 9), 1);
        assert_eq!(sheet_row(10, 0), 10);
    }
}
