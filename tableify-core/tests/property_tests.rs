//! Property tests for the pure pipeline stages.
//!
//! Uses proptest to verify:
//! 1. YTD formula over in-year closes, regardless of input order
//! 2. Absent values always format as "N/A", present values never do
//! 3. Validation normalizes tickers and drops blanks
//! 4. Delimited text splits back into the table's grid

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use serde_json::Value;
use tableify_core::catalog::{FormatKind, MetricCatalog};
use tableify_core::export::grid_to_delimited_text;
use tableify_core::format::{format_number, format_value, NOT_AVAILABLE};
use tableify_core::provider::DailyClose;
use tableify_core::request::{validate, ValidationError};
use tableify_core::table::Grid;
use tableify_core::ytd::compute_ytd;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..5000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_kind() -> impl Strategy<Value = FormatKind> {
    prop_oneof![
        Just(FormatKind::CurrencyB),
        Just(FormatKind::CurrencyM),
        Just(FormatKind::Percent),
        Just(FormatKind::FixedDecimal2),
        Just(FormatKind::Raw),
    ]
}

fn arb_symbol() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,5}(-[A-Za-z])?"
}

fn arb_cell() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 $%./-]{0,12}"
}

fn year_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

// ── 1. YTD ───────────────────────────────────────────────────────────

proptest! {
    /// YTD uses the earliest and latest in-year closes, whatever the input order.
    #[test]
    fn ytd_matches_formula(
        prices in prop::collection::vec(arb_price(), 1..60),
        pre_year in prop::collection::vec(arb_price(), 0..5),
        rotate in 0usize..60,
    ) {
        let mut closes: Vec<DailyClose> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| DailyClose::new(year_start() + Days::new(i as u64), p))
            .collect();
        closes.extend(
            pre_year
                .iter()
                .enumerate()
                .map(|(i, &p)| DailyClose::new(year_start() - Days::new(i as u64 + 1), p)),
        );
        let n = closes.len();
        closes.rotate_left(rotate % n);

        let first = prices[0];
        let last = prices[prices.len() - 1];
        let expected = (last - first) / first * 100.0;

        let ytd = compute_ytd(&closes, year_start()).unwrap();
        prop_assert!((ytd - expected).abs() < 1e-9);
    }

    /// Only pre-year closes means no YTD at all.
    #[test]
    fn ytd_without_in_year_data_is_unavailable(
        pre_year in prop::collection::vec(arb_price(), 0..10),
    ) {
        let closes: Vec<DailyClose> = pre_year
            .iter()
            .enumerate()
            .map(|(i, &p)| DailyClose::new(year_start() - Days::new(i as u64 + 1), p))
            .collect();
        prop_assert!(compute_ytd(&closes, year_start()).is_err());
    }
}

// ── 2. Formatting ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn absent_value_is_na(kind in arb_kind()) {
        prop_assert_eq!(format_number(None, kind), NOT_AVAILABLE);
        prop_assert_eq!(format_value(None, kind), NOT_AVAILABLE);
        prop_assert_eq!(format_value(Some(&Value::Null), kind), NOT_AVAILABLE);
    }

    #[test]
    fn non_numeric_value_is_na(kind in arb_kind(), text in ".{0,20}") {
        prop_assert_eq!(format_value(Some(&Value::String(text)), kind), NOT_AVAILABLE);
    }

    #[test]
    fn finite_value_is_never_na(kind in arb_kind(), v in -1e13..1e13_f64) {
        prop_assert_ne!(format_number(Some(v), kind), NOT_AVAILABLE);
    }

    /// Two-decimal kinds always show exactly two fractional digits.
    #[test]
    fn fixed_decimal_has_two_places(v in -1e6..1e6_f64) {
        let s = format_number(Some(v), FormatKind::FixedDecimal2);
        let (_, frac) = s.split_once('.').unwrap();
        prop_assert_eq!(frac.len(), 2);
    }
}

// ── 3. Validation ────────────────────────────────────────────────────

proptest! {
    /// Tickers come back trimmed, uppercased, in input order, blanks dropped.
    #[test]
    fn tickers_are_normalized(
        symbols in prop::collection::vec(arb_symbol(), 1..8),
        pad in "[ \t]{0,3}",
        blanks in 0usize..3,
    ) {
        let mut parts: Vec<String> = symbols.iter().map(|s| format!("{pad}{s}{pad}")).collect();
        parts.extend(std::iter::repeat(pad.clone()).take(blanks));
        let raw = parts.join(",");

        let catalog = MetricCatalog::standard();
        let request = validate(&raw, &["beta"], &catalog).unwrap();
        let got: Vec<&str> = request.tickers().iter().map(|t| t.as_str()).collect();
        let expected: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn blank_ticker_text_is_rejected(raw in "[ ,\t]{0,10}") {
        let catalog = MetricCatalog::standard();
        prop_assert_eq!(
            validate(&raw, &["beta"], &catalog),
            Err(ValidationError::EmptyTickerList)
        );
    }

    /// Any subset of catalog ids validates, in catalog order, without duplicates.
    #[test]
    fn metric_selection_is_catalog_ordered(picks in prop::collection::vec(0usize..11, 1..20)) {
        let catalog = MetricCatalog::standard();
        let ids = catalog.ids();
        let selection: Vec<&str> = picks.iter().map(|&i| ids[i]).collect();

        let request = validate("AAPL", &selection, &catalog).unwrap();
        let got = request.metric_ids();

        let mut expected_pos: Vec<usize> = picks.clone();
        expected_pos.sort_unstable();
        expected_pos.dedup();
        let expected: Vec<&str> = expected_pos.iter().map(|&i| ids[i]).collect();
        prop_assert_eq!(got, expected);
    }
}

// ── 4. Delimited text ────────────────────────────────────────────────

proptest! {
    #[test]
    fn delimited_text_splits_back_into_grid(
        headers in prop::collection::vec(arb_cell(), 1..6),
        row_count in 0usize..6,
        seed in prop::collection::vec(arb_cell(), 36),
    ) {
        let width = headers.len();
        let rows: Vec<Vec<String>> = (0..row_count)
            .map(|r| (0..width).map(|c| seed[r * width + c].clone()).collect())
            .collect();
        let grid = Grid { headers, rows };

        let text = grid_to_delimited_text(&grid);
        let lines: Vec<Vec<String>> = text
            .split('\n')
            .map(|l| l.split('\t').map(String::from).collect())
            .collect();

        prop_assert_eq!(lines.len(), grid.rows.len() + 1);
        prop_assert_eq!(&lines[0], &grid.headers);
        prop_assert_eq!(&lines[1..], grid.rows.as_slice());
    }
}
