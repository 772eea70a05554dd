//! Yahoo Finance quote provider.
//!
//! Daily closes come from the v8 chart API; snapshot fields come from the
//! v10 quoteSummary API, which needs a session cookie plus a "crumb" token.
//! Requests retry with exponential backoff and go through the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes; those surface as `ResponseFormatChanged`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::REFERER;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ProviderConfig;
use crate::provider::{DailyClose, ProviderError, QuoteProvider, Snapshot};
use crate::request::TickerSymbol;

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart/";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary/";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const FINANCE_REFERER: &str = "https://finance.yahoo.com/";

/// quoteSummary modules merged into one snapshot, earlier modules win.
pub const SUMMARY_MODULES: [&str; 4] = [
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
    "price",
];

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    description: String,
}

// ─── chart ──────────────────────────────────────────────────────────

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
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// ─── quoteSummary ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<ApiError>,
}

/// Yahoo Finance provider over a blocking HTTP client.
pub struct YahooProvider {
    client: Client,
    circuit_breaker: Arc<CircuitBreaker>,
    crumb: Mutex<Option<String>>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(
        config: &ProviderConfig,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            crumb: Mutex::new(None),
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        })
    }

    /// Chart API URL for daily bars from `since` until `until_ts`.
    fn chart_url(symbol: &str, since: NaiveDate, until_ts: i64) -> Result<Url, ProviderError> {
        let start_ts = since.and_time(NaiveTime::MIN).and_utc().timestamp();
        let mut url = Url::parse(CHART_URL).map_err(|e| ProviderError::Other(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Other("chart URL cannot be a base".into()))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &until_ts.to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }

    fn summary_url(symbol: &str, crumb: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(SUMMARY_URL).map_err(|e| ProviderError::Other(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Other("summary URL cannot be a base".into()))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("modules", &SUMMARY_MODULES.join(","))
            .append_pair("crumb", crumb);
        Ok(url)
    }

    /// Parse a chart response into daily closes, oldest first.
    ///
    /// A known symbol with no bars in range yields an empty vector.
    fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<DailyClose>, ProviderError> {
        let Some(result) = resp.chart.result else {
            return Err(api_error(symbol, resp.chart.error));
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let mut closes = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            // holidays and halted sessions come back as null
            if let Some(close) = quote.close.get(i).copied().flatten() {
                closes.push(DailyClose::new(date, close));
            }
        }

        closes.sort_by_key(|c| c.date);
        Ok(closes)
    }

    /// Flatten quoteSummary modules into one field map.
    ///
    /// `{"raw": n, "fmt": "..."}` wrappers collapse to `n`; empty objects
    /// (Yahoo's "no value") are skipped.
    fn flatten_modules(modules: &Map<String, Value>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for name in SUMMARY_MODULES {
            let Some(Value::Object(fields)) = modules.get(name) else {
                continue;
            };
            for (key, value) in fields {
                if snapshot.field(key).is_some() {
                    continue;
                }
                let value = match value {
                    Value::Object(obj) if obj.is_empty() => continue,
                    Value::Object(obj) => match obj.get("raw") {
                        Some(raw) => raw.clone(),
                        None => continue,
                    },
                    other => other.clone(),
                };
                snapshot.insert(key.clone(), value);
            }
        }
        snapshot
    }

    fn parse_summary(symbol: &str, resp: SummaryResponse) -> Result<Snapshot, ProviderError> {
        let Some(result) = resp.quote_summary.result else {
            return Err(api_error(symbol, resp.quote_summary.error));
        };
        let modules = result.into_iter().next().ok_or_else(|| ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        Ok(Self::flatten_modules(&modules))
    }

    /// GET with retry, backoff, and circuit breaker bookkeeping.
    ///
    /// A 404 is returned as a response: Yahoo puts the "Not Found" reason in the body.
    fn get_with_retry(&self, symbol: &str, url: &Url) -> Result<Response, ProviderError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(ProviderError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(ProviderError::CircuitBreakerTripped);
            }

            debug!(symbol, url = %url, "GET");
            match self
                .client
                .get(url.clone())
                .header(REFERER, FINANCE_REFERER)
                .send()
            {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(ProviderError::CircuitBreakerTripped);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(ProviderError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ProviderError::AuthenticationRequired(format!(
                            "Yahoo Finance rejected the request for {symbol}"
                        )));
                    }

                    if status.is_server_error() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    if status.is_success() || status == StatusCode::NOT_FOUND {
                        self.circuit_breaker.record_success();
                        return Ok(resp);
                    }

                    return Err(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(ProviderError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }

    fn cached_crumb(&self) -> Option<String> {
        self.crumb.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn invalidate_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Cookie + crumb handshake; the crumb is cached for the provider's lifetime.
    fn crumb(&self) -> Result<String, ProviderError> {
        if let Some(crumb) = self.cached_crumb() {
            return Ok(crumb);
        }
        if !self.circuit_breaker.is_allowed() {
            return Err(ProviderError::CircuitBreakerTripped);
        }

        // Only the session cookie matters here; fc.yahoo.com itself answers 404.
        if let Err(e) = self.client.get(COOKIE_URL).header(REFERER, FINANCE_REFERER).send() {
            debug!(error = %e, "cookie request failed");
        }

        for endpoint in CRUMB_URLS {
            let resp = match self.client.get(endpoint).header(REFERER, FINANCE_REFERER).send() {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(endpoint, error = %e, "crumb request failed");
                    continue;
                }
            };
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                return Err(ProviderError::RateLimited {
                    retry_after_secs: 60,
                });
            }
            if !resp.status().is_success() {
                continue;
            }
            let Ok(body) = resp.text() else { continue };
            if let Some(crumb) = valid_crumb(&body) {
                *self.crumb.lock().unwrap_or_else(|e| e.into_inner()) = Some(crumb.clone());
                return Ok(crumb);
            }
        }

        Err(ProviderError::AuthenticationRequired(
            "failed to obtain Yahoo crumb".into(),
        ))
    }

    fn fetch_summary(&self, symbol: &str, crumb: &str) -> Result<Snapshot, ProviderError> {
        let url = Self::summary_url(symbol, crumb)?;
        let resp = self.get_with_retry(symbol, &url)?;
        let summary: SummaryResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("failed to parse summary for {symbol}: {e}"))
        })?;
        Self::parse_summary(symbol, summary)
    }
}

fn api_error(symbol: &str, error: Option<ApiError>) -> ProviderError {
    match error {
        Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
    }
}

fn valid_crumb(body: &str) -> Option<String> {
    let body = body.trim();
    let plausible = !body.is_empty()
        && body.len() < 100
        && !body.contains(char::is_whitespace)
        && !body.contains('<')
        && !body.to_ascii_lowercase().contains("too many requests");
    plausible.then(|| body.to_string())
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn snapshot(&self, ticker: &TickerSymbol) -> Result<Snapshot, ProviderError> {
        let crumb = self.crumb()?;
        match self.fetch_summary(ticker.as_str(), &crumb) {
            Err(ProviderError::AuthenticationRequired(_)) => {
                debug!(%ticker, "crumb rejected, refreshing");
                self.invalidate_crumb();
                let crumb = self.crumb()?;
                self.fetch_summary(ticker.as_str(), &crumb)
            }
            other => other,
        }
    }

    fn historical_closes(
        &self,
        ticker: &TickerSymbol,
        since: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError> {
        let symbol = ticker.as_str();
        let url = Self::chart_url(symbol, since, Utc::now().timestamp())?;
        let resp = self.get_with_retry(symbol, &url)?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!("failed to parse chart for {symbol}: {e}"))
        })?;
        Self::parse_chart(symbol, chart)
    }
}
