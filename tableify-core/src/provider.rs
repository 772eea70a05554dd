//! Quote provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over market data sources (Yahoo Finance,
//! JSON fixtures) so the table builder can be driven by real data or by mocks.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::request::TickerSymbol;
use crate::table::FormattedRow;

/// One daily closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

impl DailyClose {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Current snapshot fields for a ticker, as reported by the provider.
///
/// Values are kept as untrusted JSON: a field may be a number, a string,
/// `null`, or missing entirely. Coercion to numbers happens at format time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Builder-style insert, handy for mocks.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Structured error types for provider calls.
///
/// Every variant means "this call for this ticker is unavailable"; the table
/// builder degrades the affected cells instead of aborting.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider error: {0}")]
    Other(String),
}

/// Trait for market data sources.
///
/// Implementations make one attempt per call from the builder's point of view;
/// any internal retry policy is the provider's own business.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Current snapshot fields for `ticker`.
    fn snapshot(&self, ticker: &TickerSymbol) -> Result<Snapshot, ProviderError>;

    /// Daily closes from `since` to the latest available date, oldest first.
    ///
    /// An empty vector means no trading data in range, which is not an error.
    fn historical_closes(
        &self,
        ticker: &TickerSymbol,
        since: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError>;
}

/// Progress callback for the per-ticker fetch loop.
pub trait FetchProgress {
    /// Called once per ticker, before any provider call for it.
    fn on_start(&self, ticker: &TickerSymbol, index: usize, total: usize);

    /// Called when the ticker's row has been assembled.
    fn on_complete(&self, row: &FormattedRow, index: usize, total: usize);

    /// Called when every ticker has a row.
    fn on_batch_complete(&self, complete: usize, degraded: usize, total: usize);
}

/// Progress hook that ignores every event.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_start(&self, _ticker: &TickerSymbol, _index: usize, _total: usize) {}

    fn on_complete(&self, _row: &FormattedRow, _index: usize, _total: usize) {}

    fn on_batch_complete(&self, _complete: usize, _degraded: usize, _total: usize) {}
}

/// Progress reporter that prints to stderr, keeping stdout for the table.
pub struct StderrProgress;

impl FetchProgress for StderrProgress {
    fn on_start(&self, ticker: &TickerSymbol, index: usize, total: usize) {
        eprintln!("[{}/{}] Fetching data for {ticker}...", index + 1, total);
    }

    fn on_complete(&self, row: &FormattedRow, _index: usize, _total: usize) {
        for issue in &row.issues {
            eprintln!("  {}: {issue}", row.ticker);
        }
    }

    fn on_batch_complete(&self, complete: usize, degraded: usize, total: usize) {
        if degraded > 0 {
            eprintln!("Fetched {total} ticker(s): {complete} complete, {degraded} with missing data");
        }
    }
}
