//! Metric catalog — the static registry of selectable metrics.
//!
//! Each metric maps a snapshot field id to a display name and a format kind.
//! Adding a metric is a data change here, never a new branch in the formatter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot key consulted when `netIncome` is missing.
pub const DEFAULT_NET_INCOME_FALLBACK: &str = "netIncomeToCommon";

/// How a raw metric value is rendered into a display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Billions of dollars: `$2.50B`.
    CurrencyB,
    /// Millions of dollars: `$1.25M`.
    CurrencyM,
    /// Ratio shown as a percentage: `0.1523` → `15.23%`.
    Percent,
    /// Two decimals, no symbol.
    FixedDecimal2,
    /// Number as-is.
    Raw,
}

impl FormatKind {
    pub fn label(&self) -> &'static str {
        match self {
            FormatKind::CurrencyB => "currency (billions)",
            FormatKind::CurrencyM => "currency (millions)",
            FormatKind::Percent => "percent",
            FormatKind::FixedDecimal2 => "2 decimals",
            FormatKind::Raw => "raw",
        }
    }
}

/// A single selectable metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Snapshot field id, e.g. `trailingPE`.
    pub id: String,
    /// Column header, e.g. `Trailing P/E`.
    pub display_name: String,
    pub format_kind: FormatKind,
    /// Secondary snapshot field used when the primary one is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_field: Option<String>,
}

impl MetricDefinition {
    pub fn new(id: &str, display_name: &str, format_kind: FormatKind) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            format_kind,
            fallback_field: None,
        }
    }

    pub fn with_fallback(mut self, field: &str) -> Self {
        self.fallback_field = Some(field.to_string());
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate metric id: {0}")]
    DuplicateId(String),
}

/// Ordered, immutable set of metric definitions with unique ids.
#[derive(Debug, Clone, Serialize)]
pub struct MetricCatalog {
    metrics: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(metrics: Vec<MetricDefinition>) -> Result<Self, CatalogError> {
        for (i, m) in metrics.iter().enumerate() {
            if metrics[..i].iter().any(|prev| prev.id == m.id) {
                return Err(CatalogError::DuplicateId(m.id.clone()));
            }
        }
        Ok(Self { metrics })
    }

    /// The eleven standard metrics with the default net income fallback.
    pub fn standard() -> Self {
        Self::with_net_income_fallback(DEFAULT_NET_INCOME_FALLBACK)
    }

    /// Standard metrics, with `netIncome` falling back to `fallback_field`.
    pub fn with_net_income_fallback(fallback_field: &str) -> Self {
        use FormatKind::*;

        let metrics = vec![
            MetricDefinition::new("trailingPE", "Trailing P/E", FixedDecimal2),
            MetricDefinition::new("forwardPE", "Forward P/E", FixedDecimal2),
            MetricDefinition::new("beta", "Beta", FixedDecimal2),
            MetricDefinition::new("marketCap", "Market Cap", CurrencyB),
            MetricDefinition::new("priceToBook", "Price to Book", FixedDecimal2),
            MetricDefinition::new("enterpriseToEbitda", "EV/EBITDA", FixedDecimal2),
            MetricDefinition::new("trailingEps", "EPS (TTM)", FixedDecimal2),
            MetricDefinition::new("totalRevenue", "Revenue", CurrencyM),
            MetricDefinition::new("netIncome", "Net Income", CurrencyM)
                .with_fallback(fallback_field),
            MetricDefinition::new("profitMargins", "Profit Margin", Percent),
            MetricDefinition::new("dividendYield", "Dividend Yield", Percent),
        ];

        Self { metrics }
    }

    pub fn get(&self, id: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Position of `id` in catalog order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_eleven_metrics_in_order() {
        let c = MetricCatalog::standard();
        assert_eq!(c.len(), 11);
        assert_eq!(c.ids().first(), Some(&"trailingPE"));
        assert_eq!(c.ids().last(), Some(&"dividendYield"));
    }

    #[test]
    fn format_kinds_follow_metric_semantics() {
        let c = MetricCatalog::standard();
        assert_eq!(c.get("marketCap").unwrap().format_kind, FormatKind::CurrencyB);
        assert_eq!(c.get("totalRevenue").unwrap().format_kind, FormatKind::CurrencyM);
        assert_eq!(c.get("profitMargins").unwrap().format_kind, FormatKind::Percent);
        assert_eq!(c.get("beta").unwrap().format_kind, FormatKind::FixedDecimal2);
    }

    #[test]
    fn only_net_income_has_a_fallback() {
        let c = MetricCatalog::standard();
        let with_fallback: Vec<&str> = c
            .iter()
            .filter(|m| m.fallback_field.is_some())
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(with_fallback, vec!["netIncome"]);
        assert_eq!(
            c.get("netIncome").unwrap().fallback_field.as_deref(),
            Some(DEFAULT_NET_INCOME_FALLBACK)
        );
    }

    #[test]
    fn fallback_key_is_configurable() {
        let c = MetricCatalog::with_net_income_fallback("netIncomeCommon");
        assert_eq!(
            c.get("netIncome").unwrap().fallback_field.as_deref(),
            Some("netIncomeCommon")
        );
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let c = MetricCatalog::standard();
        assert!(c.get("Beta").is_none());
        assert_eq!(c.position("beta"), Some(2));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = MetricCatalog::new(vec![
            MetricDefinition::new("beta", "Beta", FormatKind::FixedDecimal2),
            MetricDefinition::new("beta", "Beta again", FormatKind::Raw),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::DuplicateId("beta".into()));
    }
}
