//! Remote spreadsheet sync.
//!
//! Only data sheets are pushed, and only their values: formulas go out as
//! their cached results. Each sheet becomes one range addressed as
//! `{sheet}!A1:{lastColumn}{lastRow}`.

use crate::config::{AccountConfig, RemoteTarget};
use ivylab_core::workbook::{CellValue, Workbook};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const SHEETS_API: &str = "https://sheets.googleapis.com";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown account '{0}'")]
    UnknownAccount(String),

    #[error("no token for account '{account}': environment variable {env} is not set")]
    MissingCredentials { account: String, env: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// One range write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub range: String,
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub spreadsheet_id: String,
    pub updated_ranges: usize,
    pub updated_cells: usize,
}

/// Pushes workbook values to a remote spreadsheet.
pub trait RemoteSync: Send + Sync {
    fn name(&self) -> &str;

    fn push(&self, workbook: &Workbook, target: &RemoteTarget) -> Result<SyncSummary, SyncError>;
}

fn json_value(value: &CellValue) -> serde_json::Value {
    match value.resolved() {
        Some(CellValue::Number(n)) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(String::new())),
        Some(other) => serde_json::Value::String(other.display()),
        None => serde_json::Value::String(String::new()),
    }
}

/// One value range per non-empty data sheet, in sheet order.
pub fn value_ranges(workbook: &Workbook) -> Vec<ValueRange> {
    workbook
        .data_sheets()
        .filter_map(|sheet| {
            let used = sheet.used_range()?;
            let blank = serde_json::Value::String(String::new());
            let mut values = vec![vec![blank; used.end.col + 1]; used.end.row + 1];
            for (at, cell) in &sheet.cells {
                values[at.row][at.col] = json_value(&cell.value);
            }
            Some(ValueRange {
                range: used.on_sheet(&sheet.name),
                values,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    value_input_option: &'static str,
    data: &'a [ValueRange],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BatchUpdateResponse {
    total_updated_cells: Option<usize>,
    total_updated_sheets: Option<usize>,
}

/// Google Sheets `values:batchUpdate` client.
pub struct GoogleSheetsSync {
    http: reqwest::blocking::Client,
    accounts: BTreeMap<String, AccountConfig>,
    base_url: String,
}

impl GoogleSheetsSync {
    pub fn new(accounts: BTreeMap<String, AccountConfig>) -> Result<Self, SyncError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            accounts,
            base_url: SHEETS_API.to_string(),
        })
    }

    /// Point at another endpoint (a local stub in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn token(&self, account: &str) -> Result<String, SyncError> {
        let config = self
            .accounts
            .get(account)
            .ok_or_else(|| SyncError::UnknownAccount(account.to_string()))?;
        std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::MissingCredentials {
                account: account.to_string(),
                env: config.token_env.clone(),
            })
    }

    fn endpoint(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/values:batchUpdate",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl RemoteSync for GoogleSheetsSync {
    fn name(&self) -> &str {
        "google_sheets"
    }

    fn push(&self, workbook: &Workbook, target: &RemoteTarget) -> Result<SyncSummary, SyncError> {
        let token = self.token(&target.account)?;
        let data = value_ranges(workbook);
        let cells: usize = data.iter().map(|r| r.values.iter().map(Vec::len).sum::<usize>()).sum();

        let response = self
            .http
            .post(self.endpoint(&target.spreadsheet_id))
            .bearer_auth(token)
            .json(&BatchUpdateRequest {
                value_input_option: "RAW",
                data: &data,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: BatchUpdateResponse = response.json().unwrap_or_default();

        Ok(SyncSummary {
            spreadsheet_id: target.spreadsheet_id.clone(),
            updated_ranges: parsed.total_updated_sheets.unwrap_or(data.len()),
            updated_cells: parsed.total_updated_cells.unwrap_or(cells),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivylab_core::workbook::{CellRef, Sheet, SheetKind};

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let mut dash = Sheet::new("Dashboard", SheetKind::Dashboard);
        dash.set(CellRef::new(0, 0), CellValue::text("x"), None).unwrap();
        wb.push_sheet(dash).unwrap();
        wb.push_sheet(Sheet::new("Charts", SheetKind::Charts)).unwrap();

        let mut vti = Sheet::new("VTI", SheetKind::Data);
        vti.set(CellRef::new(0, 0), CellValue::text("Date"), None).unwrap();
        vti.set(CellRef::new(0, 2), CellValue::text("200 Day SMA"), None).unwrap();
        vti.set(CellRef::new(1, 1), CellValue::Number(262.5), None).unwrap();
        let average = CellValue::formula("AVERAGE(B2:B3)", CellValue::Number(250.0));
        vti.set(CellRef::new(2, 2), average, None).unwrap();
        wb.push_sheet(vti).unwrap();
        wb.push_sheet(Sheet::new("EMPTY", SheetKind::Data)).unwrap();
        wb
    }

    #[test]
    fn ranges_cover_data_sheets_only() {
        let ranges = value_ranges(&workbook());
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].range, "VTI!A1:C3");
        assert_eq!(ranges[0].values.len(), 3);
        assert_eq!(ranges[0].values[0][0], serde_json::json!("Date"));
        assert_eq!(ranges[0].values[1][1], serde_json::json!(262.5));
        assert_eq!(ranges[0].values[1][0], serde_json::json!(""));
        // formula cells carry their value
        assert_eq!(ranges[0].values[2][2], serde_json::json!(250.0));
    }

    #[test]
    fn quoted_sheet_names_in_ranges() {
        let mut wb = Workbook::new();
        let mut s = Sheet::new("BRK.B", SheetKind::Data);
        s.set(CellRef::new(0, 0), CellValue::text("Date"), None).unwrap();
        wb.push_sheet(s).unwrap();
        assert_eq!(value_ranges(&wb)[0].range, "'BRK.B'!A1:A1");
    }

    #[test]
    fn missing_token_is_reported() {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            "personal".to_string(),
            AccountConfig {
                token_env: "IVYLAB_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
            },
        );
        let sync = GoogleSheetsSync::new(accounts).unwrap();
        let target = RemoteTarget {
            account: "personal".into(),
            spreadsheet_id: "abc".into(),
        };
        assert!(matches!(
            sync.push(&workbook(), &target),
            Err(SyncError::MissingCredentials { .. })
        ));

        let other = RemoteTarget {
            account: "work".into(),
            spreadsheet_id: "abc".into(),
        };
        assert!(matches!(sync.push(&workbook(), &other), Err(SyncError::UnknownAccount(_))));
    }

    #[test]
    fn batch_update_body_shape() {
        let data = value_ranges(&workbook());
        let body = serde_json::to_value(BatchUpdateRequest {
            value_input_option: "RAW",
            data: &data,
        })
        .unwrap();
        assert_eq!(body["valueInputOption"], "RAW");
        assert_eq!(body["data"][0]["range"], "VTI!A1:C3");
    }

    #[test]
    fn endpoint_url() {
        let sync = GoogleSheetsSync::new(BTreeMap::new())
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(
            sync.endpoint("abc"),
            "http://localhost:8080/v4/spreadsheets/abc/values:batchUpdate"
        );
    }
}
