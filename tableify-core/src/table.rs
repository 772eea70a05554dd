//! Table assembly — drives the provider per ticker and formats every cell.
//!
//! The builder never fails at the table level. Each provider call is handled
//! on its own: a failed history call blanks the YTD cell, a failed snapshot
//! call blanks the metric cells, and the row is always emitted. Rows come out
//! in request order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::MetricDefinition;
use crate::format::{format_metric, format_ytd, NOT_AVAILABLE};
use crate::provider::{FetchProgress, QuoteProvider};
use crate::request::{Request, TickerSymbol};
use crate::ytd::{compute_ytd, year_start};

pub const TICKER_HEADER: &str = "Ticker";
pub const YTD_HEADER: &str = "YTD Performance";
pub const METRIC_HEADER: &str = "Metric";

/// What a column holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ColumnKey {
    Ticker,
    YtdPerformance,
    Metric(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: ColumnKey,
    pub header: String,
}

impl Column {
    pub fn ticker() -> Self {
        Self {
            key: ColumnKey::Ticker,
            header: TICKER_HEADER.to_string(),
        }
    }

    pub fn ytd() -> Self {
        Self {
            key: ColumnKey::YtdPerformance,
            header: YTD_HEADER.to_string(),
        }
    }

    pub fn metric(def: &MetricDefinition) -> Self {
        Self {
            key: ColumnKey::Metric(def.id.clone()),
            header: def.display_name.clone(),
        }
    }
}

/// Why one or more cells of a row fell back to "N/A".
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum RowIssue {
    #[error("price history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("YTD unavailable: {0}")]
    YtdUnavailable(String),

    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

/// One ticker's formatted values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedRow {
    pub ticker: TickerSymbol,
    pub ytd_performance: String,
    /// Metric id → display string.
    pub metric_values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<RowIssue>,
}

impl FormattedRow {
    /// True when no provider call or calculation failed for this row.
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// Display value for `column`; "N/A" if the row has no such metric.
    pub fn value(&self, column: &Column) -> &str {
        match &column.key {
            ColumnKey::Ticker => self.ticker.as_str(),
            ColumnKey::YtdPerformance => &self.ytd_performance,
            ColumnKey::Metric(id) => self
                .metric_values
                .get(id)
                .map(String::as_str)
                .unwrap_or(NOT_AVAILABLE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Plain header + string rows, the shape handed to renderers and exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Assembled result: fixed columns, one row per requested ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    columns: Vec<Column>,
    rows: Vec<FormattedRow>,
}

impl ResultTable {
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<FormattedRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[FormattedRow] {
        &self.rows
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    /// Find a column by header (case-insensitive) or metric id.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.header.eq_ignore_ascii_case(name)
                || matches!(&c.key, ColumnKey::Metric(id) if id == name)
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let r = self.rows.get(row)?;
        let c = self.columns.get(column)?;
        Some(r.value(c))
    }

    pub fn row_cells(&self, row: &FormattedRow) -> Vec<String> {
        self.columns.iter().map(|c| row.value(c).to_string()).collect()
    }

    /// Rows whose cells all came from successful calls.
    pub fn complete_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_complete()).count()
    }

    pub fn to_grid(&self) -> Grid {
        Grid {
            headers: self.columns.iter().map(|c| c.header.clone()).collect(),
            rows: self.rows.iter().map(|r| self.row_cells(r)).collect(),
        }
    }

    /// Metric-per-row layout: a `Metric` column, then one column per ticker.
    pub fn transposed(&self) -> Grid {
        let mut headers = vec![METRIC_HEADER.to_string()];
        headers.extend(self.rows.iter().map(|r| r.ticker.to_string()));

        let rows = self
            .columns
            .iter()
            .filter(|c| c.key != ColumnKey::Ticker)
            .map(|c| {
                let mut line = vec![c.header.clone()];
                line.extend(self.rows.iter().map(|r| r.value(c).to_string()));
                line
            })
            .collect();

        Grid { headers, rows }
    }

    /// A copy with rows reordered by `column`. "N/A" cells always sort last.
    ///
    /// Returns `None` if `column` is out of range.
    pub fn sorted_by(&self, column: usize, direction: SortDirection) -> Option<ResultTable> {
        let col = self.columns.get(column)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| compare_cells(a.value(col), b.value(col), direction));
        Some(ResultTable::new(self.columns.clone(), rows))
    }
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey<'a> {
    Number(f64),
    Text(&'a str),
}

fn sort_key(cell: &str) -> Option<SortKey<'_>> {
    if cell == NOT_AVAILABLE {
        return None;
    }
    let stripped = cell
        .trim_start_matches('$')
        .trim_end_matches(&['%', 'B', 'M'][..]);
    match stripped.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(SortKey::Number(v)),
        _ => Some(SortKey::Text(cell)),
    }
}

fn compare_cells(a: &str, b: &str, direction: SortDirection) -> Ordering {
    match (sort_key(a), sort_key(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(ka), Some(kb)) => {
            let ord = ka.partial_cmp(&kb).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        }
    }
}

/// Builds a `ResultTable` from a request and a provider.
#[derive(Debug, Clone, Copy)]
pub struct TableBuilder {
    year_start: NaiveDate,
}

impl TableBuilder {
    /// YTD window anchored on today's local date.
    pub fn new() -> Self {
        Self::as_of(chrono::Local::now().date_naive())
    }

    /// YTD window anchored on January 1 of `today`'s year.
    pub fn as_of(today: NaiveDate) -> Self {
        Self {
            year_start: year_start(today),
        }
    }

    pub fn year_start(&self) -> NaiveDate {
        self.year_start
    }

    /// Fetch and format every ticker in request order.
    pub fn build(
        &self,
        request: &Request,
        provider: &dyn QuoteProvider,
        progress: &dyn FetchProgress,
    ) -> ResultTable {
        let mut columns = vec![Column::ticker(), Column::ytd()];
        columns.extend(request.metrics().iter().map(Column::metric));

        let total = request.tickers().len();
        let mut rows = Vec::with_capacity(total);

        for (i, ticker) in request.tickers().iter().enumerate() {
            progress.on_start(ticker, i, total);
            let row = self.build_row(ticker, request.metrics(), provider);
            progress.on_complete(&row, i, total);
            rows.push(row);
        }

        let table = ResultTable::new(columns, rows);
        let complete = table.complete_rows();
        progress.on_batch_complete(complete, total - complete, total);
        info!(
            provider = provider.name(),
            tickers = total,
            complete,
            "built result table"
        );
        table
    }

    fn build_row(
        &self,
        ticker: &TickerSymbol,
        metrics: &[MetricDefinition],
        provider: &dyn QuoteProvider,
    ) -> FormattedRow {
        let mut issues = Vec::new();

        debug!(%ticker, since = %self.year_start, "fetching historical closes");
        let ytd_performance = match provider.historical_closes(ticker, self.year_start) {
            Ok(closes) => match compute_ytd(&closes, self.year_start) {
                Ok(pct) => format_ytd(pct),
                Err(e) => {
                    warn!(%ticker, error = %e, "YTD unavailable");
                    issues.push(RowIssue::YtdUnavailable(e.to_string()));
                    NOT_AVAILABLE.to_string()
                }
            },
            Err(e) => {
                warn!(%ticker, error = %e, "historical closes unavailable");
                issues.push(RowIssue::HistoryUnavailable(e.to_string()));
                NOT_AVAILABLE.to_string()
            }
        };

        debug!(%ticker, "fetching snapshot");
        let metric_values = match provider.snapshot(ticker) {
            Ok(snapshot) => metrics
                .iter()
                .map(|m| (m.id.clone(), format_metric(&snapshot, m)))
                .collect(),
            Err(e) => {
                warn!(%ticker, error = %e, "snapshot unavailable");
                issues.push(RowIssue::SnapshotUnavailable(e.to_string()));
                metrics
                    .iter()
                    .map(|m| (m.id.clone(), NOT_AVAILABLE.to_string()))
                    .collect()
            }
        };

        FormattedRow {
            ticker: ticker.clone(),
            ytd_performance,
            metric_values,
            issues,
        }
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
