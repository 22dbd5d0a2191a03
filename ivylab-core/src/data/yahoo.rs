//! Yahoo Finance client.
//!
//! Price history comes from the v8 chart API, descriptions from the v10
//! quoteSummary `price` module. Both need a cookie + crumb session. The
//! session lives on the client instance and is refetched when Yahoo answers
//! 401. Retries use a fixed delay and a bounded attempt count; the shared
//! circuit breaker stops everything after a ban or repeated rate limiting.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, FinancialDataClient, RawHistory, RawRow};
use chrono::{Days, NaiveDate, NaiveTime};
use reqwest::header;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const CHART_BASE: &str = "https://query2.finance.yahoo.com/v8/finance/chart/";
const SUMMARY_BASE: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary/";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Column order of every history this client returns.
pub const CHART_COLUMNS: [&str; 6] = ["Adjusted Close", "Open", "High", "Low", "Close", "Volume"];

/// Literal written for absent values; ingest treats it as null.
const MISSING: &str = "null";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<SummaryData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
}

/// Cookie + crumb pair required by the query endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    cookie: String,
    crumb: String,
}

/// Retry and timeout settings for [`YahooClient`].
#[derive(Debug, Clone, Copy)]
pub struct YahooSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct YahooClient {
    http: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    session: Mutex<Option<Session>>,
    settings: YahooSettings,
}

fn network_error(e: reqwest::Error) -> DataError {
    DataError::NetworkUnreachable(e.to_string())
}

impl YahooClient {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        settings: YahooSettings,
    ) -> Result<Self, DataError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            circuit_breaker,
            session: Mutex::new(None),
            settings,
        })
    }

    fn session_slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_session(&self) {
        *self.session_slot() = None;
    }

    fn ensure_session(&self) -> Result<Session, DataError> {
        if let Some(session) = self.session_slot().as_ref() {
            return Ok(session.clone());
        }
        let session = self.fetch_session()?;
        *self.session_slot() = Some(session.clone());
        Ok(session)
    }

    fn fetch_session(&self) -> Result<Session, DataError> {
        tracing::debug!("requesting Yahoo session");
        let response = self.http.get(COOKIE_URL).send().map_err(network_error)?;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| DataError::AuthenticationRequired("no session cookie issued".into()))?;

        let response = self
            .http
            .get(CRUMB_URL)
            .header(header::COOKIE, &cookie)
            .send()
            .map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataError::AuthenticationRequired(format!(
                "crumb request returned {status}"
            )));
        }
        let crumb = response.text().map_err(network_error)?.trim().to_string();
        if crumb.is_empty() {
            return Err(DataError::AuthenticationRequired("empty crumb".into()));
        }
        Ok(Session { cookie, crumb })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, DataError> {
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive
        let period2 = end
            .checked_add_days(Days::new(1))
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let mut url = symbol_url(CHART_BASE, symbol)?;
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true")
            .append_pair("events", "div,splits");
        Ok(url)
    }

    fn summary_url(symbol: &str) -> Result<Url, DataError> {
        let mut url = symbol_url(SUMMARY_BASE, symbol)?;
        url.query_pairs_mut().append_pair("modules", "price");
        Ok(url)
    }

    /// GET with session, retry and circuit-breaker handling.
    fn get_json<T: DeserializeOwned>(&self, symbol: &str, url: &Url) -> Result<T, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.settings.retry_delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let session = match self.ensure_session() {
                Ok(s) => s,
                Err(e) if e.is_transient() => {
                    tracing::debug!(symbol, attempt, error = %e, "session request failed");
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut request_url = url.clone();
            request_url
                .query_pairs_mut()
                .append_pair("crumb", &session.crumb);

            let response = match self
                .http
                .get(request_url)
                .header(header::COOKIE, &session.cookie)
                .send()
            {
                Ok(r) => r,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(network_error(e));
                    continue;
                }
                Err(e) => return Err(network_error(e)),
            };

            let status = response.status();
            match status {
                StatusCode::FORBIDDEN => {
                    self.circuit_breaker.trip();
                    return Err(DataError::CircuitBreakerTripped);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    self.circuit_breaker.record_failure();
                    let retry_after = response
                        .headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);
                    last_error = Some(DataError::RateLimited {
                        retry_after_secs: retry_after,
                    });
                    continue;
                }
                StatusCode::UNAUTHORIZED => {
                    tracing::debug!(symbol, attempt, "Yahoo session expired");
                    self.clear_session();
                    last_error = Some(DataError::AuthenticationRequired(
                        "Yahoo rejected the session".into(),
                    ));
                    continue;
                }
                StatusCode::NOT_FOUND => {
                    return Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    });
                }
                s if !s.is_success() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::Other(format!("HTTP {s} for {symbol}")));
                    continue;
                }
                _ => {}
            }

            let body: T = response.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

fn symbol_url(base: &str, symbol: &str) -> Result<Url, DataError> {
    let mut url = Url::parse(base).map_err(|e| DataError::Other(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| DataError::Other(format!("cannot build URL for {symbol}")))?
        .pop_if_empty()
        .push(symbol);
    Ok(url)
}

fn api_error(symbol: &str, err: ApiError) -> DataError {
    if err.code == "Not Found" {
        DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }
    } else {
        DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
    }
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

fn token(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

/// Convert a chart response into raw rows within `start..=end`.
fn parse_chart(
    symbol: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RawHistory, DataError> {
    let result = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) => return Err(api_error(symbol, err)),
        (Some(result), None) => result,
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    let Some(timestamps) = data.timestamp else {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
        });
    };
    let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts + offset, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
        if date < start || date > end {
            continue;
        }

        let values = [
            at(&adj_closes, i),
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
            at(&quote.volume, i),
        ];
        // Non-trading days come back with every field null.
        if values.iter().all(Option::is_none) {
            continue;
        }
        rows.push(RawRow::new(
            date.format("%Y-%m-%d").to_string(),
            values.into_iter().map(token).collect(),
        ));
    }

    if rows.is_empty() {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
        });
    }

    Ok(RawHistory {
        columns: CHART_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    })
}

fn parse_summary(symbol: &str, resp: SummaryResponse) -> Result<Option<String>, DataError> {
    if let Some(err) = resp.quote_summary.error {
        return Err(api_error(symbol, err));
    }
    let price = resp
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|d| d.price);
    Ok(price.and_then(|p| {
        p.long_name
            .filter(|n| !n.trim().is_empty())
            .or(p.short_name.filter(|n| !n.trim().is_empty()))
    }))
}

impl FinancialDataClient for YahooClient {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn description(&self, symbol: &str) -> Result<Option<String>, DataError> {
        let url = Self::summary_url(symbol)?;
        let resp: SummaryResponse = self.get_json(symbol, &url)?;
        parse_summary(symbol, resp)
    }

    fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawHistory, DataError> {
        let url = Self::chart_url(symbol, start, end)?;
        let resp: ChartResponse = self.get_json(symbol, &url)?;
        parse_chart(symbol, resp, start, end)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
