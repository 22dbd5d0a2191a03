//! Cell-addressable workbook model handed to serializers.

use super::cell_ref::{CellRange, CellRef};
use super::style::{ConditionalFormat, StyleTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Characters a spreadsheet sheet name may not contain.
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Error, PartialEq)]
pub enum WorkbookError {
    #[error("cell {cell} on sheet '{sheet}' is already written")]
    CellOccupied { sheet: String, cell: CellRef },

    #[error("merge {range} on sheet '{sheet}' overlaps an existing merge")]
    OverlappingMerge { sheet: String, range: CellRange },

    #[error("duplicate sheet name '{0}'")]
    DuplicateSheet(String),

    #[error("duplicate defined name '{0}'")]
    DuplicateName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    Dashboard,
    Charts,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// A formula plus the result computed at generation time.
    Formula {
        expr: String,
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn formula(expr: impl Into<String>, cached: CellValue) -> Self {
        CellValue::Formula {
            expr: expr.into(),
            cached: Some(Box::new(cached)),
        }
    }

    /// Value as seen by a consumer that does not evaluate formulas.
    pub fn resolved(&self) -> Option<&CellValue> {
        match self {
            CellValue::Formula { cached, .. } => cached.as_deref().and_then(CellValue::resolved),
            other => Some(other),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self.resolved()? {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.resolved()? {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// Plain-text rendering of the resolved value.
    pub fn display(&self) -> String {
        match self.resolved() {
            Some(CellValue::Text(s)) => s.clone(),
            Some(CellValue::Number(n)) => n.to_string(),
            Some(CellValue::Date(d)) => d.format("%Y-%m-%d").to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleTag>,
}

/// Workbook-level name pointing at a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub sheet: String,
    pub range: CellRange,
}

impl DefinedName {
    /// Formula target, e.g. `Dashboard!B3:B7`.
    pub fn target(&self) -> String {
        self.range.on_sheet(&self.sheet)
    }
}

/// Make an arbitrary label usable as a defined name.
pub fn sanitize_defined_name(label: &str) -> String {
    let mut name: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert(0, '_');
    }
    name
}

/// Make a symbol usable as a sheet name.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub kind: SheetKind,
    pub cells: BTreeMap<CellRef, Cell>,
    #[serde(default)]
    pub merges: Vec<CellRange>,
    #[serde(default)]
    pub conditional_formats: Vec<ConditionalFormat>,
    #[serde(default)]
    pub column_widths: BTreeMap<usize, f64>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, kind: SheetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            cells: BTreeMap::new(),
            merges: Vec::new(),
            conditional_formats: Vec::new(),
            column_widths: BTreeMap::new(),
        }
    }

    /// Write a cell. Each cell may be written once.
    pub fn set(
        &mut self,
        at: CellRef,
        value: CellValue,
        style: Option<StyleTag>,
    ) -> Result<(), WorkbookError> {
        if self.cells.contains_key(&at) {
            return Err(WorkbookError::CellOccupied {
                sheet: self.name.clone(),
                cell: at,
            });
        }
        self.cells.insert(at, Cell { value, style });
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&CellRef::new(row, col))
    }

    pub fn merge(&mut self, range: CellRange) -> Result<(), WorkbookError> {
        if self.merges.iter().any(|m| m.intersects(&range)) {
            return Err(WorkbookError::OverlappingMerge {
                sheet: self.name.clone(),
                range,
            });
        }
        self.merges.push(range);
        Ok(())
    }

    pub fn add_conditional_format(&mut self, format: ConditionalFormat) {
        self.conditional_formats.push(format);
    }

    pub fn set_column_width(&mut self, col: usize, width: f64) {
        self.column_widths.insert(col, width);
    }

    /// Smallest A1-anchored range covering every written cell.
    pub fn used_range(&self) -> Option<CellRange> {
        let last_row = self.cells.keys().map(|c| c.row).max()?;
        let last_col = self.cells.keys().map(|c| c.col).max()?;
        Some(CellRange::new(
            CellRef::new(0, 0),
            CellRef::new(last_row, last_col),
        ))
    }

    /// Resolved values as a dense grid from A1 to the used range corner.
    pub fn value_grid(&self) -> Vec<Vec<String>> {
        let Some(range) = self.used_range() else {
            return Vec::new();
        };
        let mut grid = vec![vec![String::new(); range.end.col + 1]; range.end.row + 1];
        for (at, cell) in &self.cells {
            grid[at.row][at.col] = cell.value.display();
        }
        grid
    }

    /// Style a cell ends up with after conditional formats are applied.
    pub fn effective_style(&self, at: CellRef) -> Option<StyleTag> {
        let cell = self.cells.get(&at)?;
        self.conditional_formats
            .iter()
            .find(|cf| cf.ranges.iter().any(|r| r.contains(at)) && cf.rule.matches(&cell.value))
            .map(|cf| cf.style)
            .or(cell.style)
    }

    /// BLAKE3 over every cell's position and resolved value.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (at, cell) in &self.cells {
            hasher.update(at.to_string().as_bytes());
            hasher.update(b"=");
            hasher.update(cell.value.display().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Ordered sheets plus workbook-level defined names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub defined_names: Vec<DefinedName>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet. Sheet names are unique, ignoring case.
    pub fn push_sheet(&mut self, sheet: Sheet) -> Result<(), WorkbookError> {
        if self.sheet(&sheet.name).is_some() {
            return Err(WorkbookError::DuplicateSheet(sheet.name));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn dashboard(&self) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.kind == SheetKind::Dashboard)
    }

    pub fn data_sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter().filter(|s| s.kind == SheetKind::Data)
    }

    pub fn define_name(&mut self, name: DefinedName) -> Result<(), WorkbookError> {
        if self
            .defined_names
            .iter()
            .any(|n| n.name.eq_ignore_ascii_case(&name.name))
        {
            return Err(WorkbookError::DuplicateName(name.name));
        }
        self.defined_names.push(name);
        Ok(())
    }
}
