//! Offline client reading CSV exports from a directory.
//!
//! Layout:
//! - `<dir>/<SYMBOL>.csv` with header `Date,Adjusted Close,...`, rows in any order
//! - `<dir>/descriptions.csv` (optional) with `symbol,description`

use super::ingest::parse_date;
use super::provider::{DataError, FinancialDataClient, RawHistory, RawRow};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DESCRIPTIONS_FILE: &str = "descriptions.csv";

#[derive(Debug, Clone)]
pub struct CsvDirectoryClient {
    dir: PathBuf,
    descriptions: HashMap<String, String>,
}

impl CsvDirectoryClient {
    /// Open a directory; the descriptions file is read once, if present.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DataError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("data directory not found: {}", dir.display()),
            )));
        }
        let descriptions = load_descriptions(&dir.join(DESCRIPTIONS_FILE))?;
        Ok(Self { dir, descriptions })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn history_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

fn csv_error(path: &Path, e: csv::Error) -> DataError {
    DataError::Other(format!("{}: {e}", path.display()))
}

fn load_descriptions(path: &Path) -> Result<HashMap<String, String>, DataError> {
    let mut map = HashMap::new();
    if !path.exists() {
        return Ok(map);
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        if let (Some(symbol), Some(description)) = (record.get(0), record.get(1)) {
            if !symbol.is_empty() && !description.is_empty() {
                map.insert(symbol.to_uppercase(), description.to_string());
            }
        }
    }
    Ok(map)
}

/// Read one history file, keeping rows whose date falls in `start..=end`.
///
/// Rows with an unparseable date are passed through so ingest can report them.
pub fn read_history(
    path: &Path,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RawHistory, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let Some(date) = record.get(0) else {
            continue;
        };
        if let Some(parsed) = parse_date(date) {
            if parsed < start || parsed > end {
                continue;
            }
        }
        rows.push(RawRow::new(
            date,
            record.iter().skip(1).map(str::to_string).collect(),
        ));
    }

    Ok(RawHistory { columns, rows })
}

impl FinancialDataClient for CsvDirectoryClient {
    fn name(&self) -> &str {
        "csv_directory"
    }

    fn description(&self, symbol: &str) -> Result<Option<String>, DataError> {
        Ok(self.descriptions.get(&symbol.to_uppercase()).cloned())
    }

    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawHistory, DataError> {
        let path = self.history_path(symbol);
        if !path.exists() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        let history = read_history(&path, start, end)?;
        if history.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(history)
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("VTI.csv"),
            "Date,Adjusted Close,Close\n\
             2024-06-03,262.1,263.0\n\
             2024-05-31,259.9,260.5\n\
             2024-04-01,250.0,251.0\n\
             not-a-date,1.0,1.0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(DESCRIPTIONS_FILE),
            "symbol,description\nvti,Vanguard Total Stock Market ETF\nIEF,\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn reads_history_within_range() {
        let dir = fixture();
        let client = CsvDirectoryClient::open(dir.path()).unwrap();
        let history = client.price_history("VTI", d(2024, 5, 1), d(2024, 6, 30)).unwrap();

        assert_eq!(history.columns, vec!["Adjusted Close", "Close"]);
        let dates: Vec<&str> = history.rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-06-03", "2024-05-31", "not-a-date"]);
        assert_eq!(history.rows[0].values, vec!["262.1", "263.0"]);
    }

    #[test]
    fn range_filter_accepts_every_ingest_date_format() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("VTI.csv"),
            "Date,Adjusted Close\n\
             2024/05/30,1.0\n\
             2024/05/31,2.0\n\
             2024/06/10,3.0\n\
             2019/01/02,4.0\n\
             2024-06-03T00:00:00Z,5.0\n",
        )
        .unwrap();
        let client = CsvDirectoryClient::open(dir.path()).unwrap();
        let history = client.price_history("VTI", d(2020, 5, 31), d(2024, 5, 31)).unwrap();

        let dates: Vec<&str> = history.rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2024/05/30", "2024/05/31"]);
    }

    #[test]
    fn missing_file_is_no_data() {
        let dir = fixture();
        let client = CsvDirectoryClient::open(dir.path()).unwrap();
        let err = client.price_history("VEU", d(2024, 1, 1), d(2024, 6, 30)).unwrap_err();
        assert!(matches!(err, DataError::NoData { .. }));
    }

    #[test]
    fn descriptions_are_case_insensitive_and_optional() {
        let dir = fixture();
        let client = CsvDirectoryClient::open(dir.path()).unwrap();
        assert_eq!(
            client.description("VTI").unwrap().as_deref(),
            Some("Vanguard Total Stock Market ETF")
        );
        assert_eq!(client.description("IEF").unwrap(), None);
        assert_eq!(client.description("VEU").unwrap(), None);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CsvDirectoryClient::open(dir.path().join("nope")).is_err());
    }
}
