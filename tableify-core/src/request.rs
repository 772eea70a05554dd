//! Request validation — turns raw user input into a normalized `Request`.
//!
//! Pure string processing, no network access. Ticker order and duplicates are
//! preserved; the metric selection is a set reported in catalog order.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{MetricCatalog, MetricDefinition};

/// A trimmed, uppercased, non-empty ticker symbol.
///
/// Inner whitespace runs (tabs, newlines) collapse to one space, so a symbol
/// never carries the delimiters used by the text export. No further
/// validation: the provider decides whether the symbol exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Normalize a raw token. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TickerSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors surfaced to the user before any fetch happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please enter at least one ticker symbol")]
    EmptyTickerList,

    #[error("please select at least one metric")]
    NoMetricsSelected,

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
}

/// A validated request: tickers in input order, metrics in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    tickers: Vec<TickerSymbol>,
    metrics: Vec<MetricDefinition>,
}

impl Request {
    pub fn tickers(&self) -> &[TickerSymbol] {
        &self.tickers
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn metric_ids(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Split comma-separated ticker text into normalized symbols, dropping blanks.
pub fn parse_tickers(raw: &str) -> Vec<TickerSymbol> {
    raw.split(',').filter_map(TickerSymbol::parse).collect()
}

/// Validate raw ticker text and a metric selection against `catalog`.
///
/// Blank metric ids are ignored; a selection with nothing else is empty.
pub fn validate<S: AsRef<str>>(
    raw_ticker_text: &str,
    raw_metric_selection: &[S],
    catalog: &MetricCatalog,
) -> Result<Request, ValidationError> {
    let tickers = parse_tickers(raw_ticker_text);
    if tickers.is_empty() {
        return Err(ValidationError::EmptyTickerList);
    }

    let selected: Vec<&str> = raw_metric_selection
        .iter()
        .map(|id| id.as_ref().trim())
        .filter(|id| !id.is_empty())
        .collect();
    if selected.is_empty() {
        return Err(ValidationError::NoMetricsSelected);
    }

    let mut positions = Vec::with_capacity(selected.len());
    for id in selected {
        let pos = catalog
            .position(id)
            .ok_or_else(|| ValidationError::UnknownMetric(id.to_string()))?;
        positions.push(pos);
    }
    positions.sort_unstable();
    positions.dedup();

    let metrics = catalog
        .iter()
        .enumerate()
        .filter(|(i, _)| positions.binary_search(i).is_ok())
        .map(|(_, m)| m.clone())
        .collect();

    Ok(Request { tickers, metrics })
}
