//! Metric formatting — raw values to display strings.
//!
//! Formatting is a pure function of `(value, kind)`. Absent or non-numeric
//! input always renders as [`NOT_AVAILABLE`]; this module never panics on
//! provider data.

use serde_json::Value;

use crate::catalog::{FormatKind, MetricDefinition};
use crate::provider::Snapshot;

/// Sentinel for a cell with no usable value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Coerce an untrusted JSON value to a finite number.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Format an optional number per `kind`.
pub fn format_number(value: Option<f64>, kind: FormatKind) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };

    match kind {
        FormatKind::CurrencyB => format!("${:.2}B", v / 1e9),
        FormatKind::CurrencyM => format!("${:.2}M", v / 1e6),
        FormatKind::Percent => format!("{:.2}%", v * 100.0),
        FormatKind::FixedDecimal2 => format!("{v:.2}"),
        FormatKind::Raw => format!("{v}"),
    }
}

/// Format an optional raw snapshot value per `kind`.
pub fn format_value(value: Option<&Value>, kind: FormatKind) -> String {
    format_number(value.and_then(numeric), kind)
}

/// YTD display convention: the percentage as-is, two decimals.
pub fn format_ytd(pct: f64) -> String {
    if pct.is_finite() {
        format!("{pct:.2}%")
    } else {
        NOT_AVAILABLE.to_string()
    }
}

/// Look up `metric` in `snapshot`, honouring its fallback field.
pub fn metric_value(snapshot: &Snapshot, metric: &MetricDefinition) -> Option<f64> {
    snapshot.field(&metric.id).and_then(numeric).or_else(|| {
        metric
            .fallback_field
            .as_deref()
            .and_then(|key| snapshot.field(key))
            .and_then(numeric)
    })
}

/// Render one metric cell from a snapshot.
pub fn format_metric(snapshot: &Snapshot, metric: &MetricDefinition) -> String {
    format_number(metric_value(snapshot, metric), metric.format_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MetricCatalog;
    use serde_json::json;

    const ALL_KINDS: [FormatKind; 5] = [
        FormatKind::CurrencyB,
        FormatKind::CurrencyM,
        FormatKind::Percent,
        FormatKind::FixedDecimal2,
        FormatKind::Raw,
    ];

    #[test]
    fn absent_is_na_for_every_kind() {
        for kind in ALL_KINDS {
            assert_eq!(format_number(None, kind), "N/A");
            assert_eq!(format_value(None, kind), "N/A");
        }
    }

    #[test]
    fn currency_billions() {
        assert_eq!(format_number(Some(2_500_000_000.0), FormatKind::CurrencyB), "$2.50B");
        assert_eq!(format_number(Some(-1_200_000_000.0), FormatKind::CurrencyB), "$-1.20B");
    }

    #[test]
    fn currency_millions() {
        assert_eq!(format_number(Some(1_250_000.0), FormatKind::CurrencyM), "$1.25M");
    }

    #[test]
    fn percent_scales_ratio() {
        assert_eq!(format_number(Some(0.1523), FormatKind::Percent), "15.23%");
    }

    #[test]
    fn fixed_two_decimals() {
        assert_eq!(format_number(Some(23.456), FormatKind::FixedDecimal2), "23.46");
        assert_eq!(format_number(Some(7.0), FormatKind::FixedDecimal2), "7.00");
    }

    #[test]
    fn raw_has_no_scaling() {
        assert_eq!(format_number(Some(1234.5), FormatKind::Raw), "1234.5");
        assert_eq!(format_number(Some(42.0), FormatKind::Raw), "42");
    }

    #[test]
    fn non_numeric_values_are_na() {
        for v in [json!("12.3"), json!(true), json!(null), json!({"raw": 1.0}), json!([1])] {
            assert_eq!(format_value(Some(&v), FormatKind::FixedDecimal2), "N/A");
        }
    }

    #[test]
    fn non_finite_numbers_are_na() {
        assert_eq!(format_number(Some(f64::NAN), FormatKind::Percent), "N/A");
        assert_eq!(format_number(Some(f64::INFINITY), FormatKind::Raw), "N/A");
    }

    #[test]
    fn integer_json_numbers_are_numeric() {
        assert_eq!(
            format_value(Some(&json!(3_000_000_000_u64)), FormatKind::CurrencyB),
            "$3.00B"
        );
    }

    #[test]
    fn ytd_uses_its_own_convention() {
        assert_eq!(format_ytd(12.346), "12.35%");
        assert_eq!(format_ytd(-3.0), "-3.00%");
        assert_eq!(format_ytd(f64::NAN), "N/A");
    }

    #[test]
    fn net_income_prefers_primary_field() {
        let catalog = MetricCatalog::standard();
        let metric = catalog.get("netIncome").unwrap();
        let snap = Snapshot::new()
            .with("netIncome", 5_000_000.0)
            .with("netIncomeToCommon", 9_000_000.0);
        assert_eq!(format_metric(&snap, metric), "$5.00M");
    }

    #[test]
    fn net_income_falls_back_when_primary_missing() {
        let catalog = MetricCatalog::standard();
        let metric = catalog.get("netIncome").unwrap();
        let snap = Snapshot::new().with("netIncomeToCommon", 9_000_000.0);
        assert_eq!(format_metric(&snap, metric), "$9.00M");
    }

    #[test]
    fn net_income_falls_back_when_primary_not_numeric() {
        let catalog = MetricCatalog::standard();
        let metric = catalog.get("netIncome").unwrap();
        let snap = Snapshot::new()
            .with("netIncome", Value::Null)
            .with("netIncomeToCommon", 1_500_000.0);
        assert_eq!(format_metric(&snap, metric), "$1.50M");
    }

    #[test]
    fn net_income_both_missing_is_na() {
        let catalog = MetricCatalog::standard();
        let metric = catalog.get("netIncome").unwrap();
        assert_eq!(format_metric(&Snapshot::new(), metric), "N/A");
    }

    #[test]
    fn metrics_without_fallback_ignore_other_fields() {
        let catalog = MetricCatalog::standard();
        let metric = catalog.get("totalRevenue").unwrap();
        let snap = Snapshot::new().with("netIncomeToCommon", 1_500_000.0);
        assert_eq!(format_metric(&snap, metric), "N/A");
    }
}
