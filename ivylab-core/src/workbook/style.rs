//! Style tags and conditional-format rules.
//!
//! Cells carry a semantic [`StyleTag`]; serializers resolve tags to concrete
//! formatting through [`StyleTag::format`].

use super::cell_ref::CellRange;
use super::model::CellValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleTag {
    TableTitle,
    ColumnLabel,
    Caption,
    Symbol,
    Date,
    Price,
    Percent,
    Invested,
    Cash,
    Buy,
    Neutral,
    Sell,
}

/// Concrete formatting for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellFormat {
    pub bold: bool,
    pub centered: bool,
    pub fill: Option<&'static str>,
    pub font_color: Option<&'static str>,
    pub number_format: Option<&'static str>,
}

impl CellFormat {
    const PLAIN: CellFormat = CellFormat {
        bold: false,
        centered: false,
        fill: None,
        font_color: None,
        number_format: None,
    };
}

impl StyleTag {
    pub fn format(self) -> CellFormat {
        match self {
            StyleTag::TableTitle => CellFormat {
                bold: true,
                centered: true,
                fill: Some("#1F4E78"),
                font_color: Some("#FFFFFF"),
                ..CellFormat::PLAIN
            },
            StyleTag::ColumnLabel => CellFormat {
                bold: true,
                centered: true,
                fill: Some("#D9E1F2"),
                ..CellFormat::PLAIN
            },
            StyleTag::Caption => CellFormat {
                font_color: Some("#595959"),
                ..CellFormat::PLAIN
            },
            StyleTag::Symbol => CellFormat {
                bold: true,
                ..CellFormat::PLAIN
            },
            StyleTag::Date => CellFormat {
                number_format: Some("yyyy-mm-dd"),
                ..CellFormat::PLAIN
            },
            StyleTag::Price => CellFormat {
                number_format: Some("0.00"),
                ..CellFormat::PLAIN
            },
            StyleTag::Percent => CellFormat {
                number_format: Some("0.00"),
                centered: true,
                ..CellFormat::PLAIN
            },
            StyleTag::Invested => CellFormat {
                centered: true,
                fill: Some("#C6EFCE"),
                font_color: Some("#006100"),
                ..CellFormat::PLAIN
            },
            StyleTag::Cash => CellFormat {
                bold: true,
                centered: true,
                fill: Some("#FFC7CE"),
                font_color: Some("#9C0006"),
                ..CellFormat::PLAIN
            },
            StyleTag::Buy => CellFormat {
                fill: Some("#C6EFCE"),
                ..CellFormat::PLAIN
            },
            StyleTag::Neutral => CellFormat {
                fill: Some("#FFEB9C"),
                ..CellFormat::PLAIN
            },
            StyleTag::Sell => CellFormat {
                fill: Some("#FFC7CE"),
                ..CellFormat::PLAIN
            },
        }
    }
}

/// Condition evaluated against a cell's (cached) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatRule {
    TextEquals { text: String },
    GreaterThan { value: f64 },
    /// Inclusive on both ends.
    Between { min: f64, max: f64 },
    LessThan { value: f64 },
}

impl FormatRule {
    pub fn matches(&self, value: &CellValue) -> bool {
        match self {
            FormatRule::TextEquals { text } => value.as_text() == Some(text.as_str()),
            FormatRule::GreaterThan { value: v } => value.as_number().is_some_and(|n| n > *v),
            FormatRule::Between { min, max } => {
                value.as_number().is_some_and(|n| n >= *min && n <= *max)
            }
            FormatRule::LessThan { value: v } => value.as_number().is_some_and(|n| n < *v),
        }
    }
}

/// A rule applied across one or more ranges of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormat {
    pub ranges: Vec<CellRange>,
    pub rule: FormatRule,
    pub style: StyleTag,
}
