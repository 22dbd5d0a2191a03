//! Workbook grid model: sheets of addressable cells with styles, merges,
//! conditional formats and defined names. Serializers consume this model;
//! nothing here knows about file formats.

pub mod cell_ref;
pub mod model;
pub mod style;

pub use cell_ref::{column_index, column_letters, quote_sheet_name, CellRange, CellRef};
pub use model::{
    sanitize_defined_name, sanitize_sheet_name, Cell, CellValue, DefinedName, Sheet, SheetKind,
    Workbook, WorkbookError,
};
pub use style::{CellFormat, ConditionalFormat, FormatRule, StyleTag};
