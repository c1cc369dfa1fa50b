//! Time series containers handed from one pipeline stage to the next

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Delimited input as read from disk: a header plus untyped cells
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, col)`; ragged rows read as empty
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render a cleaned series back into loader form under the given
    /// timestamp header, so it can pass through the cleaner again
    pub fn from_series(series: &CleanSeries, timestamp_column: &str) -> Self {
        let mut headers = Vec::with_capacity(series.columns.len() + 1);
        headers.push(timestamp_column.to_string());
        headers.extend(series.columns.iter().map(|c| c.name.clone()));

        let rows = series
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let mut row = Vec::with_capacity(headers.len());
                row.push(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string());
                for column in &series.columns {
                    row.push(column.values[i].map(|v| v.to_string()).unwrap_or_default());
                }
                row
            })
            .collect();

        RawTable { headers, rows }
    }
}

/// Named numeric column where `None` marks a missing value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name == name)
}

/// Output of the cleaner: unique, strictly increasing timestamps and
/// numeric-or-missing columns in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub columns: Vec<Column>,
}

impl CleanSeries {
    pub fn column(&self, name: &str) -> Option<&Column> {
        find_column(&self.columns, name)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Inferred sampling step of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub step: Duration,
    /// True when the step is the configured default rather than a median gap
    pub is_fallback: bool,
}

impl Cadence {
    pub fn inferred(step: Duration) -> Self {
        Self {
            step,
            is_fallback: false,
        }
    }

    pub fn fallback(step: Duration) -> Self {
        Self {
            step,
            is_fallback: true,
        }
    }

    /// Whole minutes in one step (floored)
    pub fn step_minutes(&self) -> i64 {
        self.step.num_seconds() / 60
    }
}

/// Output of the resampler: a uniform grid at `cadence.step`
#[derive(Debug, Clone, PartialEq)]
pub struct RegularSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub columns: Vec<Column>,
    pub cadence: Cadence,
}

impl RegularSeries {
    pub fn column(&self, name: &str) -> Option<&Column> {
        find_column(&self.columns, name)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_raw_table_ragged_cell() {
        let table = RawTable::new(
            vec!["timestamp".into(), "Energy".into()],
            vec![vec!["2024-03-01 00:00:00".into()]],
        );
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.column_index("Energy"), Some(1));
        assert!(!table.has_column("Power"));
    }

    #[test]
    fn test_clean_series_renders_missing_as_empty() {
        let series = CleanSeries {
            timestamps: vec![ts(0, 0), ts(0, 15)],
            columns: vec![Column::new("Energy", vec![Some(1.5), None])],
        };
        let table = RawTable::from_series(&series, "timestamp");
        assert_eq!(table.headers, vec!["timestamp", "Energy"]);
        assert_eq!(table.rows[0], vec!["2024-03-01 00:00:00", "1.5"]);
        assert_eq!(table.rows[1][1], "");
    }

    #[test]
    fn test_clean_series_keeps_timestamp_header() {
        let series = CleanSeries {
            timestamps: vec![ts(0, 0)],
            columns: vec![Column::new("Energy", vec![Some(2.0)])],
        };
        let table = RawTable::from_series(&series, "time");
        assert_eq!(table.headers, vec!["time", "Energy"]);
        assert_eq!(table.column_index("time"), Some(0));
        assert!(!table.has_column("timestamp"));
    }

    #[test]
    fn test_cadence_step_minutes() {
        assert_eq!(Cadence::inferred(Duration::minutes(15)).step_minutes(), 15);
        assert_eq!(Cadence::inferred(Duration::seconds(90)).step_minutes(), 1);
        assert_eq!(Cadence::inferred(Duration::seconds(30)).step_minutes(), 0);
    }
}
