//! Offline provider backed by a JSON document.
//!
//! ```json
//! {
//!   "AAPL": {
//!     "snapshot": { "trailingPE": 28.5, "marketCap": 3.1e12 },
//!     "closes": [ { "date": "2026-01-02", "close": 100.0 } ]
//!   }
//! }
//! ```
//!
//! A ticker absent from the document is `SymbolNotFound`. A ticker entry that
//! omits `snapshot` or `closes` (or sets it to `null`) fails that call only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{DailyClose, ProviderError, QuoteProvider, Snapshot};
use crate::request::TickerSymbol;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureEntry {
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub closes: Option<Vec<DailyClose>>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    entries: BTreeMap<String, FixtureEntry>,
}

impl FixtureProvider {
    pub fn new(entries: BTreeMap<String, FixtureEntry>) -> Self {
        // lookups go through TickerSymbol, which is uppercase
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .collect();
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let entries: BTreeMap<String, FixtureEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn entry(&self, ticker: &TickerSymbol) -> Result<&FixtureEntry, ProviderError> {
        self.entries
            .get(ticker.as_str())
            .ok_or_else(|| ProviderError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
    }
}

impl QuoteProvider for FixtureProvider {
    fn name(&self) -> &str {
        "fixture"
    }

    fn snapshot(&self, ticker: &TickerSymbol) -> Result<Snapshot, ProviderError> {
        self.entry(ticker)?
            .snapshot
            .clone()
            .ok_or_else(|| ProviderError::Other(format!("fixture has no snapshot for {ticker}")))
    }

    fn historical_closes(
        &self,
        ticker: &TickerSymbol,
        since: NaiveDate,
    ) -> Result<Vec<DailyClose>, ProviderError> {
        let closes = self
            .entry(ticker)?
            .closes
            .as_ref()
            .ok_or_else(|| ProviderError::Other(format!("fixture has no history for {ticker}")))?;

        let mut in_range: Vec<DailyClose> =
            closes.iter().copied().filter(|c| c.date >= since).collect();
        in_range.sort_by_key(|c| c.date);
        Ok(in_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "aapl": {
            "snapshot": { "trailingPE": 28.5, "beta": null },
            "closes": [
                { "date": "2026-01-05", "close": 110.0 },
                { "date": "2025-12-31", "close": 90.0 },
                { "date": "2026-01-02", "close": 100.0 }
            ]
        },
        "NOHIST": { "snapshot": {} }
    }"#;

    fn sym(s: &str) -> TickerSymbol {
        TickerSymbol::parse(s).unwrap()
    }

    fn jan1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn keys_are_normalized() {
        let p = FixtureProvider::from_json(DOC).unwrap();
        assert_eq!(p.tickers().collect::<Vec<_>>(), vec!["AAPL", "NOHIST"]);
        assert!(p.snapshot(&sym("aapl")).is_ok());
    }

    #[test]
    fn closes_are_filtered_and_sorted() {
        let p = FixtureProvider::from_json(DOC).unwrap();
        let closes = p.historical_closes(&sym("AAPL"), jan1()).unwrap();
        let values: Vec<f64> = closes.iter().map(|c| c.close).collect();
        assert_eq!(values, vec![100.0, 110.0]);
    }

    #[test]
    fn snapshot_keeps_raw_values() {
        let p = FixtureProvider::from_json(DOC).unwrap();
        let snap = p.snapshot(&sym("AAPL")).unwrap();
        assert_eq!(snap.field("trailingPE"), Some(&serde_json::json!(28.5)));
        assert_eq!(snap.field("beta"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn unknown_ticker_is_symbol_not_found() {
        let p = FixtureProvider::from_json(DOC).unwrap();
        let err = p.snapshot(&sym("ZZZZ")).unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound { symbol } if symbol == "ZZZZ"));
        assert!(p.historical_closes(&sym("ZZZZ"), jan1()).is_err());
    }

    #[test]
    fn missing_history_fails_only_that_call() {
        let p = FixtureProvider::from_json(DOC).unwrap();
        assert!(p.snapshot(&sym("NOHIST")).unwrap().is_empty());
        assert!(matches!(
            p.historical_closes(&sym("NOHIST"), jan1()),
            Err(ProviderError::Other(_))
        ));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        assert!(matches!(
            FixtureProvider::from_json("{ not json"),
            Err(FixtureError::Parse(_))
        ));
    }
}
