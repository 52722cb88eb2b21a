//! Hourly consumption CSV reader.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::series::TimeSeries;

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct Row {
    timestamp: String,
    value: f64,
}

fn parse_timestamp(raw: &str, line: usize) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            EngineError::input(
                format!("consumption[{line}].timestamp"),
                format!("cannot parse {raw:?} as a timestamp"),
            )
        })
}

/// Reads `timestamp,value` rows (kWh per hour) into a validated series.
///
/// # Errors
///
/// Returns `EngineError::Csv` for malformed rows and `EngineError::Input`
/// for unparseable timestamps or a series that fails validation (gaps,
/// negative values, empty file).
pub fn read_consumption(reader: impl Read) -> Result<TimeSeries> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        let row = row?;
        timestamps.push(parse_timestamp(&row.timestamp, i)?);
        values.push(row.value);
    }
    TimeSeries::new(timestamps, values)
}

/// Reads a consumption CSV file.
///
/// # Errors
///
/// Returns `EngineError::Io` when the file cannot be opened, otherwise as
/// [`read_consumption`].
pub fn read_consumption_file(path: &Path) -> Result<TimeSeries> {
    read_consumption(File::open(path)?)
}
