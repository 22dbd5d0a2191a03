//! A1-style cell addressing.
//!
//! Rows and columns are 0-based internally and rendered 1-based with
//! base-26 column letters (A..Z, AA..ZZ, AAA..).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Column letters for a 0-based column index: 0 → "A", 26 → "AA".
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Inverse of [`column_letters`]. Case-insensitive.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n - 1)
}

/// Quote a sheet name for use in a formula when it is not a plain identifier.
///
/// Names that read as a cell address (`AB1`) are quoted too.
pub fn quote_sheet_name(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && CellRef::parse(name).is_none();
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// A single cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse "B12" style references (no `$`, no sheet prefix).
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        let col = column_index(letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self { row: row - 1, col })
    }

    /// Reference qualified with a sheet name, e.g. `'My Sheet'!B2`.
    pub fn on_sheet(&self, sheet: &str) -> String {
        format!("{}!{}", quote_sheet_name(sheet), self)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CellRef::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid cell ref '{s}'")))
    }
}

/// Inclusive rectangular range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    /// Normalizes so that `start` is the top-left corner.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn row_span(row: usize, first_col: usize, last_col: usize) -> Self {
        Self::new(CellRef::new(row, first_col), CellRef::new(row, last_col))
    }

    pub fn column_span(col: usize, first_row: usize, last_row: usize) -> Self {
        Self::new(CellRef::new(first_row, col), CellRef::new(last_row, col))
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && other.start.row <= self.end.row
            && self.start.col <= other.end.col
            && other.start.col <= self.end.col
    }

    pub fn on_sheet(&self, sheet: &str) -> String {
        format!("{}!{}", quote_sheet_name(sheet), self)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn letters_inverse() {
        for i in [0, 1, 25, 26, 51, 52, 701, 702, 16383] {
            assert_eq!(column_index(&column_letters(i)), Some(i));
        }
        assert_eq!(column_index("ab"), Some(27));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn cell_display_and_parse() {
        let c = CellRef::new(1, 7);
        assert_eq!(c.to_string(), "H2");
        assert_eq!(CellRef::parse("H2"), Some(c));
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("12"), None);
    }

    #[test]
    fn sheet_quoting() {
        assert_eq!(quote_sheet_name("VTI"), "VTI");
        assert_eq!(quote_sheet_name("BRK.B"), "'BRK.B'");
        assert_eq!(quote_sheet_name("O'Neil Fund"), "'O''Neil Fund'");
        assert_eq!(quote_sheet_name("1X"), "'1X'");
        assert_eq!(quote_sheet_name("AB1"), "'AB1'");
        assert_eq!(quote_sheet_name("ab12"), "'ab12'");
        assert_eq!(CellRef::new(1, 1).on_sheet("AB1"), "'AB1'!B2");
        assert_eq!(quote_sheet_name("A1B"), "A1B");
        assert_eq!(CellRef::new(1, 1).on_sheet("^GSPC"), "'^GSPC'!B2");
    }

    #[test]
    fn range_ops() {
        let r = CellRange::new(CellRef::new(3, 2), CellRef::new(1, 0));
        assert_eq!(r.to_string(), "A2:C4");
        assert!(r.contains(CellRef::new(2, 1)));
        assert!(!r.contains(CellRef::new(4, 1)));
        let other = CellRange::row_span(3, 2, 5);
        assert!(r.intersects(&other));
        assert!(!r.intersects(&CellRange::row_span(4, 0, 2)));
    }

    #[test]
    fn cell_ref_serializes_as_a1() {
        let json = serde_json::to_string(&CellRef::new(0, 27)).unwrap();
        assert_eq!(json, "\"AB1\"");
        let back: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellRef::new(0, 27));
    }
}
