//! Tableify Core — ticker metrics aggregation.
//!
//! Turns a list of ticker symbols plus a selection of financial metrics into
//! a formatted table:
//! - Request validation against the metric catalog
//! - Year-to-date performance from daily closes
//! - Per-metric formatting with "N/A" for anything missing
//! - Table assembly over a pluggable quote provider
//! - Export to tab-delimited text and spreadsheet (xlsx or CSV) files

pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod export;
pub mod fixture;
pub mod format;
pub mod provider;
pub mod request;
pub mod table;
pub mod yahoo;
pub mod ytd;

pub use catalog::{FormatKind, MetricCatalog, MetricDefinition};
pub use config::TableifyConfig;
pub use provider::{DailyClose, FetchProgress, NoProgress, ProviderError, QuoteProvider, Snapshot};
pub use request::{validate, Request, TickerSymbol, ValidationError};
pub use table::{FormattedRow, ResultTable, SortDirection, TableBuilder};
