//! Workbook serializers.
//!
//! Two formats consume the same grid model:
//! - **JSON**: the full model (values, formulas, styles, merges, conditional
//!   formats, defined names) in `<file_name>.workbook.json`
//! - **CSV**: one values-only file per sheet under `<file_name>/`, named
//!   `NN_<sheet>.csv` so directory order matches sheet order

use crate::config::OutputFormat;
use ivylab_core::workbook::{Sheet, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize workbook: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes a workbook to disk in one format.
pub trait WorkbookSerializer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Write `workbook` under `dir` and return every path written.
    fn write(
        &self,
        workbook: &Workbook,
        dir: &Path,
        file_name: &str,
    ) -> Result<Vec<PathBuf>, ExportError>;
}

/// Build the serializer for a configured format.
pub fn serializer_for(format: OutputFormat) -> Box<dyn WorkbookSerializer> {
    match format {
        OutputFormat::Json => Box::new(JsonWorkbookWriter),
        OutputFormat::Csv => Box::new(CsvWorkbookWriter),
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub struct JsonWorkbookWriter;

impl JsonWorkbookWriter {
    pub fn path(dir: &Path, file_name: &str) -> PathBuf {
        dir.join(format!("{file_name}.workbook.json"))
    }
}

/// Serialize a workbook to pretty JSON.
pub fn workbook_to_json(workbook: &Workbook) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(workbook)?)
}

/// Parse a workbook written by [`JsonWorkbookWriter`].
pub fn workbook_from_json(json: &str) -> Result<Workbook, ExportError> {
    Ok(serde_json::from_str(json)?)
}

impl WorkbookSerializer for JsonWorkbookWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn write(
        &self,
        workbook: &Workbook,
        dir: &Path,
        file_name: &str,
    ) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let path = Self::path(dir, file_name);
        let json = workbook_to_json(workbook)?;
        fs::write(&path, json).map_err(io_error(&path))?;
        Ok(vec![path])
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

pub struct CsvWorkbookWriter;

/// File-system safe stem for a sheet name.
fn file_stem(sheet_name: &str) -> String {
    sheet_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

/// Resolved values of one sheet as CSV text.
pub fn sheet_to_csv(sheet: &Sheet) -> Result<String, ExportError> {
    let mut wtr = csv::WriterBuilder::new().flexible(false).from_writer(vec![]);
    for row in sheet.value_grid() {
        wtr.write_record(&row)?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

impl CsvWorkbookWriter {
    pub fn dir(dir: &Path, file_name: &str) -> PathBuf {
        dir.join(file_name)
    }
}

impl WorkbookSerializer for CsvWorkbookWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn write(
        &self,
        workbook: &Workbook,
        dir: &Path,
        file_name: &str,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let out = Self::dir(dir, file_name);
        fs::create_dir_all(&out).map_err(io_error(&out))?;

        // Sheets left over from an earlier run.
        for entry in fs::read_dir(&out).map_err(io_error(&out))? {
            let path = entry.map_err(io_error(&out))?.path();
            if path.extension().is_some_and(|e| e == "csv") {
                fs::remove_file(&path).map_err(io_error(&path))?;
            }
        }

        let mut paths = Vec::with_capacity(workbook.sheets.len());
        for (i, sheet) in workbook.sheets.iter().enumerate() {
            let path = out.join(format!("{:02}_{}.csv", i + 1, file_stem(&sheet.name)));
            fs::write(&path, sheet_to_csv(sheet)?).map_err(io_error(&path))?;
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivylab_core::workbook::{CellRef, CellValue, SheetKind};

    fn workbook() -> Workbook {
        let mut dash = Sheet::new("Dashboard", SheetKind::Dashboard);
        dash.set(CellRef::new(0, 0), CellValue::text("200 Day SMA"), None).unwrap();
        dash.set(
            CellRef::new(2, 2),
            CellValue::formula("ROUND((VTI!B2-VTI!C2)/VTI!C2*100,2)", CellValue::Number(5.0)),
            None,
        )
        .unwrap();
        let mut data = Sheet::new("BRK.B", SheetKind::Data);
        data.set(CellRef::new(0, 0), CellValue::text("Date"), None).unwrap();
        data.set(CellRef::new(0, 1), CellValue::text("Adjusted Close"), None).unwrap();
        data.set(
            CellRef::new(1, 0),
            CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()),
            None,
        )
        .unwrap();
        data.set(CellRef::new(1, 1), CellValue::Number(412.5), None).unwrap();

        let mut wb = Workbook::new();
        wb.push_sheet(dash).unwrap();
        wb.push_sheet(Sheet::new("Charts", SheetKind::Charts)).unwrap();
        wb.push_sheet(data).unwrap();
        wb
    }

    #[test]
    fn json_writer_round_trips_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = JsonWorkbookWriter.write(&workbook(), dir.path(), "etfs").unwrap();
        assert_eq!(paths, vec![dir.path().join("etfs.workbook.json")]);

        let back = workbook_from_json(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(back, workbook());
    }

    #[test]
    fn csv_writer_emits_one_file_per_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CsvWorkbookWriter.write(&workbook(), dir.path(), "etfs").unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01_Dashboard.csv", "02_Charts.csv", "03_BRK.B.csv"]);

        let data = fs::read_to_string(&paths[2]).unwrap();
        assert_eq!(data, "Date,Adjusted Close\n2024-05-31,412.5\n");
        // formulas export their cached value
        let dash = fs::read_to_string(&paths[0]).unwrap();
        assert!(dash.lines().nth(2).unwrap().ends_with(",5"));
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "");
    }

    #[test]
    fn csv_writer_clears_stale_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let out = CsvWorkbookWriter::dir(dir.path(), "etfs");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("04_OLD.csv"), "x").unwrap();
        fs::write(out.join("notes.txt"), "keep").unwrap();

        CsvWorkbookWriter.write(&workbook(), dir.path(), "etfs").unwrap();
        assert!(!out.join("04_OLD.csv").exists());
        assert!(out.join("notes.txt").exists());
    }

    #[test]
    fn serializer_lookup() {
        assert_eq!(serializer_for(OutputFormat::Json).format(), OutputFormat::Json);
        assert_eq!(serializer_for(OutputFormat::Csv).format(), OutputFormat::Csv);
    }
}
