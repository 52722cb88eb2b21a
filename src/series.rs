//! Hourly time series with aligned timestamps.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Hours in a non-leap year.
pub const HOURS_PER_YEAR: usize = 8760;
/// Hours in a leap year.
pub const HOURS_PER_LEAP_YEAR: usize = 8784;

/// An ordered sequence of hourly energy values (kWh) with one timestamp per value.
///
/// Construction validates that both sequences have the same, non-zero length,
/// that timestamps advance by exactly one hour, and that every value is a
/// finite, non-negative number. Once built the series is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TryFrom<RawSeries> for TimeSeries {
    type Error = EngineError;

    fn try_from(raw: RawSeries) -> Result<Self> {
        Self::new(raw.timestamps, raw.values)
    }
}

impl TimeSeries {
    /// Builds a validated series.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` when the sequences are empty, differ in
    /// length, contain a gap or backwards step, or hold a negative/non-finite value.
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(EngineError::input("values", "series is empty"));
        }
        if timestamps.len() != values.len() {
            return Err(EngineError::input(
                "timestamps",
                format!(
                    "length {} does not match values length {}",
                    timestamps.len(),
                    values.len()
                ),
            ));
        }
        for (i, pair) in timestamps.windows(2).enumerate() {
            if pair[1] - pair[0] != Duration::hours(1) {
                return Err(EngineError::input(
                    format!("timestamps[{}]", i + 1),
                    format!("expected {} + 1h, got {}", pair[0], pair[1]),
                ));
            }
        }
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(EngineError::input(
                format!("values[{i}]"),
                format!("must be a finite value >= 0, got {v}"),
            ));
        }
        Ok(Self { timestamps, values })
    }

    /// Builds a series over a full calendar year starting at January 1st 00:00.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` if `values` does not hold exactly one value
    /// per hour of `year`.
    pub fn for_year(year: i32, values: Vec<f64>) -> Result<Self> {
        let timestamps = hourly_year(year)?;
        Self::new(timestamps, values)
    }

    /// Checks that the series spans exactly one year of hours.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming `field` unless the series holds
    /// 8760 or 8784 values.
    pub fn ensure_one_year(&self, field: &str) -> Result<()> {
        match self.len() {
            HOURS_PER_YEAR | HOURS_PER_LEAP_YEAR => Ok(()),
            n => Err(EngineError::input(
                field,
                format!("expected {HOURS_PER_YEAR} or {HOURS_PER_LEAP_YEAR} hourly values, got {n}"),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Zero-based month index (0 = January) of hour `i`.
    pub fn month_index(&self, i: usize) -> usize {
        self.timestamps[i].month0() as usize
    }

    /// Checks that `other` covers exactly the same hours.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming `field` on length or timestamp mismatch.
    pub fn ensure_aligned(&self, other: &TimeSeries, field: &str) -> Result<()> {
        if self.len() != other.len() {
            return Err(EngineError::input(
                field,
                format!("length {} does not match {}", other.len(), self.len()),
            ));
        }
        if self.timestamps.first() != other.timestamps.first() {
            return Err(EngineError::input(
                field,
                format!(
                    "starts at {:?}, expected {:?}",
                    other.timestamps.first(),
                    self.timestamps.first()
                ),
            ));
        }
        Ok(())
    }
}

/// Hour-start timestamps for every hour of `year`.
///
/// # Errors
///
/// Returns `EngineError::Input` when `year` is outside chrono's range.
pub fn hourly_year(year: i32) -> Result<Vec<NaiveDateTime>> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| EngineError::input("year", format!("unsupported year {year}")))?;
    let hours = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        HOURS_PER_LEAP_YEAR
    } else {
        HOURS_PER_YEAR
    };
    Ok((0..hours)
        .map(|h| start + Duration::hours(h as i64))
        .collect())
}

/// Decimal hour of day at the middle of the hour starting at `ts`.
pub(crate) fn mid_hour(ts: &NaiveDateTime) -> f64 {
    f64::from(ts.hour()) + f64::from(ts.minute()) / 60.0 + 0.5
}
