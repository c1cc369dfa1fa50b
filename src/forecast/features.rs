//! Feature engineering for the horizon models
//!
//! Calendar features depend only on the row timestamp. Lag and rolling
//! features read the target strictly before the row: a lag `L` reads
//! `t - L`, a rolling window `W` reads `t - W ..= t - 1`.

use crate::config::FeatureConfig;
use crate::domain::{find_column, Cadence, Column, RegularSeries};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CALENDAR_FEATURES: [&str; 4] = ["hour", "dayofweek", "month", "is_weekend"];

/// Calendar features of a single timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
    /// Saturday or Sunday
    pub is_weekend: bool,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        let day_of_week = timestamp.weekday().num_days_from_monday();
        Self {
            hour: timestamp.hour(),
            day_of_week,
            month: timestamp.month(),
            is_weekend: day_of_week >= 5,
        }
    }

    /// Values in `CALENDAR_FEATURES` order
    pub fn to_values(self) -> [f64; 4] {
        [
            self.hour as f64,
            self.day_of_week as f64,
            self.month as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
        ]
    }
}

/// Trailing-window statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Minimum observations for a rolling statistic to be defined
pub fn min_periods(window: usize) -> usize {
    (window / 2).max(2)
}

/// `values[t - lag]`, missing for the first `lag` rows
pub fn lag_feature(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| t.checked_sub(lag).and_then(|src| values[src]))
        .collect()
}

/// Statistics over `values[t - window ..= t - 1]` for every row `t`.
///
/// The current value is excluded. Missing values inside the window are
/// skipped; the result is missing when fewer than `min_periods(window)`
/// observations remain.
pub fn rolling_statistics(values: &[Option<f64>], window: usize) -> Vec<Option<RollingStats>> {
    let required = min_periods(window);

    (0..values.len())
        .map(|t| {
            let window_values: Vec<f64> = values[t.saturating_sub(window)..t]
                .iter()
                .flatten()
                .copied()
                .collect();
            if window_values.len() < required {
                return None;
            }

            let n = window_values.len() as f64;
            let mean = window_values.iter().sum::<f64>() / n;
            let variance = window_values
                .iter()
                .map(|x| (x - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            let min = window_values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
            let max = window_values
                .iter()
                .fold(f64::NEG_INFINITY, |a, &b| a.max(b));

            Some(RollingStats {
                mean,
                std: variance.sqrt(),
                min,
                max,
            })
        })
        .collect()
}

/// Regularised series plus engineered feature columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub timestamps: Vec<NaiveDateTime>,
    /// Source columns followed by engineered columns
    pub columns: Vec<Column>,
    pub target: String,
    /// Model input columns, in the order they are fed to the models
    pub feature_names: Vec<String>,
    pub cadence: Cadence,
}

impl FeatureFrame {
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

/// Builds calendar, lag and rolling features from a regularised series
pub struct FeatureBuilder<'a> {
    config: &'a FeatureConfig,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(config: &'a FeatureConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, series: RegularSeries, target: &str) -> Result<FeatureFrame> {
        let target_values = series
            .column(target)
            .ok_or_else(|| ForecastError::missing_column(target))?
            .values
            .clone();

        let mut feature_names: Vec<String> = series
            .columns
            .iter()
            .filter(|c| c.name != target)
            .map(|c| c.name.clone())
            .collect();
        let mut columns = series.columns;

        let calendar: Vec<[f64; 4]> = series
            .timestamps
            .iter()
            .map(|ts| CalendarFeatures::from_timestamp(*ts).to_values())
            .collect();
        for (i, name) in CALENDAR_FEATURES.iter().enumerate() {
            columns.push(Column::new(
                *name,
                calendar.iter().map(|row| Some(row[i])).collect(),
            ));
            feature_names.push(name.to_string());
        }

        for &lag in &self.config.lags {
            let name = format!("{target}_lag_{lag}");
            columns.push(Column::new(name.clone(), lag_feature(&target_values, lag)));
            feature_names.push(name);
        }

        for &window in &self.config.windows {
            let stats = rolling_statistics(&target_values, window);
            let project: [(&str, fn(&RollingStats) -> f64); 4] = [
                ("mean", |s| s.mean),
                ("std", |s| s.std),
                ("min", |s| s.min),
                ("max", |s| s.max),
            ];
            for (stat, get) in project {
                let name = format!("{target}_roll_{stat}_{window}");
                columns.push(Column::new(
                    name.clone(),
                    stats.iter().map(|s| s.as_ref().map(get)).collect(),
                ));
                feature_names.push(name);
            }
        }

        debug!(features = feature_names.len(), "features engineered");

        Ok(FeatureFrame {
            timestamps: series.timestamps,
            columns,
            target: target.to_string(),
            feature_names,
            cadence: series.cadence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn regular(values: Vec<Option<f64>>) -> RegularSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RegularSeries {
            timestamps: (0..values.len())
                .map(|i| start + Duration::minutes(15 * i as i64))
                .collect(),
            columns: vec![
                Column::new("Temp", vec![Some(20.0); values.len()]),
                Column::new("Energy", values),
            ],
            cadence: Cadence::inferred(Duration::minutes(15)),
        }
    }

    #[rstest]
    #[case("2024-06-01 13:45:00", 13, 5, 6, true)] // Saturday
    #[case("2024-06-03 00:00:00", 0, 0, 6, false)] // Monday
    #[case("2024-12-29 23:15:00", 23, 6, 12, true)] // Sunday
    fn test_calendar_features(
        #[case] raw: &str,
        #[case] hour: u32,
        #[case] dow: u32,
        #[case] month: u32,
        #[case] weekend: bool,
    ) {
        let ts = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap();
        let cal = CalendarFeatures::from_timestamp(ts);
        assert_eq!(cal.hour, hour);
        assert_eq!(cal.day_of_week, dow);
        assert_eq!(cal.month, month);
        assert_eq!(cal.is_weekend, weekend);
    }

    #[rstest]
    #[case(1, 2)]
    #[case(4, 2)]
    #[case(5, 2)]
    #[case(12, 6)]
    #[case(48, 24)]
    fn test_min_periods(#[case] window: usize, #[case] expected: usize) {
        assert_eq!(min_periods(window), expected);
    }

    #[test]
    fn test_lag_feature() {
        let values = vec![Some(1.0), Some(2.0), None, Some(4.0)];
        assert_eq!(
            lag_feature(&values, 1),
            vec![None, Some(1.0), Some(2.0), None]
        );
        assert_eq!(lag_feature(&values, 5), vec![None; 4]);
    }

    #[test]
    fn test_rolling_statistics_excludes_current_value() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(100.0)];
        let stats = rolling_statistics(&values, 3);

        assert!(stats[0].is_none());
        assert!(stats[1].is_none()); // one observation < min_periods
        let s2 = stats[2].unwrap();
        assert_eq!(s2.mean, 1.5);
        assert_eq!(s2.min, 1.0);
        assert_eq!(s2.max, 2.0);
        let s3 = stats[3].unwrap();
        assert_eq!(s3.mean, 2.0);
        assert_eq!(s3.std, 1.0);
        assert_eq!(s3.max, 3.0);
    }

    #[test]
    fn test_rolling_statistics_skips_missing() {
        let values = vec![Some(1.0), None, Some(3.0), None, Some(9.0)];
        let stats = rolling_statistics(&values, 4);
        // window for t=4 is [1.0, None, 3.0, None]
        let s = stats[4].unwrap();
        assert_eq!(s.mean, 2.0);

        let sparse = vec![Some(1.0), None, None, None, Some(9.0)];
        assert!(rolling_statistics(&sparse, 4)[4].is_none());
    }

    #[test]
    fn test_feature_names_order() {
        let config = FeatureConfig {
            lags: vec![1, 2],
            windows: vec![4],
        };
        let frame = FeatureBuilder::new(&config)
            .build(regular(vec![Some(1.0); 8]), "Energy")
            .unwrap();

        assert_eq!(
            frame.feature_names,
            vec![
                "Temp",
                "hour",
                "dayofweek",
                "month",
                "is_weekend",
                "Energy_lag_1",
                "Energy_lag_2",
                "Energy_roll_mean_4",
                "Energy_roll_std_4",
                "Energy_roll_min_4",
                "Energy_roll_max_4",
            ]
        );
        assert!(frame.column("Energy").is_some());
        assert_eq!(frame.len(), 8);
    }

    #[test]
    fn test_features_ignore_future_values() {
        let config = FeatureConfig::default();
        let values: Vec<Option<f64>> = (0..200).map(|i| Some((i as f64).sin())).collect();
        let mut perturbed = values.clone();
        perturbed[150] = Some(1e6);

        let base = FeatureBuilder::new(&config)
            .build(regular(values), "Energy")
            .unwrap();
        let moved = FeatureBuilder::new(&config)
            .build(regular(perturbed), "Energy")
            .unwrap();

        for name in &base.feature_names {
            let a = &base.column(name).unwrap().values[..=150];
            let b = &moved.column(name).unwrap().values[..=150];
            assert_eq!(a, b, "feature {name} changed before the perturbation");
        }
    }
}
