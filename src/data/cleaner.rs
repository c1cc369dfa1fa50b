//! Timestamp parsing, ordering, de-duplication and numeric coercion

use crate::domain::{CleanSeries, Column, RawTable};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

/// Naive layouts tried in order after RFC 3339
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a timestamp cell. Offsets are normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    // Unix epoch seconds
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }
    None
}

/// Parse a numeric cell; empty, NaN, infinite and garbage are missing
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Clean a raw table into a strictly increasing, de-duplicated series.
///
/// Rows whose timestamp cannot be parsed are dropped. Among rows sharing a
/// timestamp the first in input order is kept. Every other column is
/// coerced to numeric.
pub fn clean(raw: &RawTable, timestamp_column: &str) -> Result<CleanSeries> {
    let ts_idx = raw
        .column_index(timestamp_column)
        .ok_or_else(|| ForecastError::missing_column(timestamp_column))?;

    let mut parsed: Vec<(NaiveDateTime, usize)> = (0..raw.len())
        .filter_map(|row| parse_timestamp(raw.cell(row, ts_idx)).map(|ts| (ts, row)))
        .collect();

    let unparsable = raw.len() - parsed.len();
    if unparsable > 0 {
        warn!(rows = unparsable, "dropped rows with unparsable timestamps");
    }

    // Stable sort keeps input order among equal timestamps
    parsed.sort_by_key(|(ts, _)| *ts);
    let before = parsed.len();
    parsed.dedup_by_key(|(ts, _)| *ts);
    let duplicates = before - parsed.len();
    if duplicates > 0 {
        warn!(
            rows = duplicates,
            "dropped duplicate timestamps (first occurrence kept)"
        );
    }

    if parsed.is_empty() {
        return Err(ForecastError::Series(
            "no rows with a valid timestamp survived cleaning".to_string(),
        ));
    }

    let columns = raw
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != ts_idx)
        .map(|(idx, name)| {
            let values = parsed
                .iter()
                .map(|(_, row)| parse_numeric(raw.cell(*row, idx)))
                .collect();
            Column::new(name.clone(), values)
        })
        .collect();

    let timestamps = parsed.into_iter().map(|(ts, _)| ts).collect();
    let series = CleanSeries {
        timestamps,
        columns,
    };

    debug!(rows = series.len(), "series cleaned");
    Ok(series)
}
