//! Year-to-date return from a daily close series.
//!
//! Returns a raw percentage; rendering to `"X.XX%"` is done by `format`.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::provider::DailyClose;

/// Why a YTD figure could not be produced.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum YtdUnavailable {
    #[error("no closing prices since the start of the year")]
    NoData,

    #[error("first closing price of the year is zero")]
    ZeroBasePrice,

    #[error("YTD return is not a finite number")]
    NonFinite,
}

/// January 1 of `today`'s year.
pub fn year_start(today: NaiveDate) -> NaiveDate {
    NaiveDate::from_yo_opt(today.year(), 1).unwrap_or(today)
}

/// Compute `(last - first) / first * 100` over closes dated on or after `year_start`.
///
/// `first` is the close at the earliest qualifying date, `last` the close at
/// the latest date. Input order is not assumed; non-finite closes are skipped.
pub fn compute_ytd(closes: &[DailyClose], year_start: NaiveDate) -> Result<f64, YtdUnavailable> {
    let mut in_year = closes
        .iter()
        .filter(|c| c.date >= year_start && c.close.is_finite());

    let seed = in_year.next().ok_or(YtdUnavailable::NoData)?;
    let (first, last) = in_year.fold((seed, seed), |(first, last), c| {
        (
            if c.date < first.date { c } else { first },
            if c.date >= last.date { c } else { last },
        )
    });

    if first.close == 0.0 {
        return Err(YtdUnavailable::ZeroBasePrice);
    }

    let pct = (last.close - first.close) / first.close * 100.0;
    if pct.is_finite() {
        Ok(pct)
    } else {
        Err(YtdUnavailable::NonFinite)
    }
}
