//! Cadence inference and regularisation onto a uniform grid
//!
//! The step is the median gap between consecutive cleaned timestamps. The
//! grid runs from the first to the last timestamp; source points that do
//! not fall exactly on a grid tick are discarded. Gap filling is
//! asymmetric: covariates are linearly interpolated across short gaps,
//! the target is only carried forward.

use crate::config::ResampleConfig;
use crate::domain::{Cadence, CleanSeries, Column, RegularSeries};
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDateTime};
use itertools::Itertools;
use tracing::{debug, info, warn};

/// Median of consecutive gaps, or `default_step` with fewer than two points
pub fn infer_cadence(timestamps: &[NaiveDateTime], default_step: Duration) -> Result<Cadence> {
    if timestamps.is_empty() {
        return Err(ForecastError::Series(
            "cannot infer cadence of an empty series".to_string(),
        ));
    }

    let mut gaps = timestamps
        .iter()
        .tuple_windows()
        .map(|(a, b)| {
            (*b - *a).num_nanoseconds().ok_or_else(|| {
                ForecastError::Series(format!("gap between {a} and {b} is too large"))
            })
        })
        .collect::<Result<Vec<i64>>>()?;

    if gaps.is_empty() {
        warn!(
            step_minutes = default_step.num_minutes(),
            "fewer than two timestamps, falling back to default cadence"
        );
        return Ok(Cadence::fallback(default_step));
    }

    gaps.sort_unstable();
    let mid = gaps.len() / 2;
    let median = if gaps.len() % 2 == 1 {
        gaps[mid]
    } else {
        gaps[mid - 1] + (gaps[mid] - gaps[mid - 1]) / 2
    };

    if median <= 0 {
        return Err(ForecastError::Series(
            "timestamps must be strictly increasing to infer a cadence".to_string(),
        ));
    }

    Ok(Cadence::inferred(Duration::nanoseconds(median)))
}

/// Linear interpolation across gaps of at most `limit` missing values.
///
/// Interior gaps use both neighbours. Leading and trailing gaps, which have
/// a single neighbour, take that neighbour's value. Longer gaps stay missing.
pub fn interpolate_limited(values: &[Option<f64>], limit: usize) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut i = 0;

    while i < values.len() {
        if values[i].is_some() {
            i += 1;
            continue;
        }

        let start = i;
        while i < values.len() && values[i].is_none() {
            i += 1;
        }
        let run = i - start;
        if run > limit {
            continue;
        }

        let before = start.checked_sub(1).and_then(|j| values[j]);
        let after = values.get(i).copied().flatten();
        match (before, after) {
            (Some(a), Some(b)) => {
                let span = (run + 1) as f64;
                for k in 0..run {
                    out[start + k] = Some(a + (b - a) * (k + 1) as f64 / span);
                }
            }
            (Some(edge), None) | (None, Some(edge)) => {
                out[start..i].fill(Some(edge));
            }
            (None, None) => {}
        }
    }

    out
}

/// Carry the last observation forward into at most `limit` following gaps
pub fn forward_fill_limited(values: &[Option<f64>], limit: usize) -> Vec<Option<f64>> {
    let mut last = None;
    let mut streak = 0;

    values
        .iter()
        .map(|v| match v {
            Some(x) => {
                last = Some(*x);
                streak = 0;
                Some(*x)
            }
            None => {
                streak += 1;
                if streak <= limit {
                    last
                } else {
                    None
                }
            }
        })
        .collect()
}

/// Reindex a cleaned series onto its inferred grid and fill gaps
pub fn resample(series: &CleanSeries, target: &str, config: &ResampleConfig) -> Result<RegularSeries> {
    if series.column(target).is_none() {
        return Err(ForecastError::missing_column(target));
    }

    let cadence = infer_cadence(
        &series.timestamps,
        Duration::minutes(config.default_step_minutes),
    )?;
    let step = cadence
        .step
        .num_nanoseconds()
        .ok_or_else(|| ForecastError::Series("cadence overflow".to_string()))?;

    let start = series.timestamps[0];
    let end = series.timestamps[series.len() - 1];
    let span = (end - start)
        .num_nanoseconds()
        .ok_or_else(|| ForecastError::Series("series span too large".to_string()))?;

    let grid_len = (span / step) as usize + 1;
    let timestamps: Vec<NaiveDateTime> = (0..grid_len)
        .map(|k| start + Duration::nanoseconds(step * k as i64))
        .collect();

    // Source row -> grid slot, for rows sitting exactly on a tick
    let mut slots: Vec<Option<usize>> = vec![None; grid_len];
    let mut off_grid = 0usize;
    for (row, ts) in series.timestamps.iter().enumerate() {
        let offset = (*ts - start).num_nanoseconds().unwrap_or(i64::MAX);
        if offset % step == 0 {
            slots[(offset / step) as usize] = Some(row);
        } else {
            off_grid += 1;
        }
    }
    if off_grid > 0 {
        warn!(rows = off_grid, "samples not aligned to the grid were discarded");
    }

    let columns = series
        .columns
        .iter()
        .map(|column| {
            let reindexed: Vec<Option<f64>> = slots
                .iter()
                .map(|slot| slot.and_then(|row| column.values[row]))
                .collect();
            let filled = if column.name == target {
                forward_fill_limited(&reindexed, config.target_ffill_limit)
            } else {
                interpolate_limited(&reindexed, config.covariate_interp_limit)
            };
            let column = Column::new(column.name.clone(), filled);
            debug!(
                column = %column.name,
                missing = column.missing_count(),
                "column regularised"
            );
            column
        })
        .collect();

    info!(
        rows = grid_len,
        step_seconds = cadence.step.num_seconds(),
        fallback = cadence.is_fallback,
        "series resampled"
    );

    Ok(RegularSeries {
        timestamps,
        columns,
        cadence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn t(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }

    #[test]
    fn test_median_cadence_with_outlier_gap() {
        let stamps = vec![t(0), t(15), t(30), t(45), t(200), t(215)];
        let cadence = infer_cadence(&stamps, Duration::minutes(15)).unwrap();
        assert_eq!(cadence.step, Duration::minutes(15));
        assert!(!cadence.is_fallback);
    }

    #[test]
    fn test_median_cadence_even_count_averages_middle_gaps() {
        // gaps: 10, 20 -> median 15
        let stamps = vec![t(0), t(10), t(30)];
        let cadence = infer_cadence(&stamps, Duration::minutes(5)).unwrap();
        assert_eq!(cadence.step, Duration::minutes(15));
    }

    #[test]
    fn test_single_point_uses_fallback() {
        let cadence = infer_cadence(&[t(0)], Duration::minutes(15)).unwrap();
        assert!(cadence.is_fallback);
        assert_eq!(cadence.step, Duration::minutes(15));
    }

    #[test]
    fn test_empty_series_is_an_error() {
        assert!(matches!(
            infer_cadence(&[], Duration::minutes(15)),
            Err(ForecastError::Series(_))
        ));
    }

    #[rstest]
    #[case(4, true)]
    #[case(5, false)]
    fn test_interpolation_limit_boundary(#[case] gap: usize, #[case] fully_filled: bool) {
        let mut values = vec![Some(0.0)];
        values.extend(std::iter::repeat(None).take(gap));
        values.push(Some(10.0));

        let filled = interpolate_limited(&values, 4);
        assert_eq!(filled.iter().all(Option::is_some), fully_filled);
    }

    #[test]
    fn test_interpolation_is_linear() {
        let values = vec![Some(0.0), None, None, None, Some(4.0)];
        let filled = interpolate_limited(&values, 4);
        assert_eq!(
            filled,
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn test_interpolation_fills_edges_with_nearest() {
        let values = vec![None, None, Some(2.0), Some(3.0), None];
        let filled = interpolate_limited(&values, 4);
        assert_eq!(
            filled,
            vec![Some(2.0), Some(2.0), Some(2.0), Some(3.0), Some(3.0)]
        );
    }

    #[rstest]
    #[case(2, vec![Some(1.0), Some(1.0), Some(1.0), Some(5.0)])]
    #[case(3, vec![Some(1.0), Some(1.0), Some(1.0), None, Some(5.0)])]
    fn test_forward_fill_limit_boundary(#[case] gap: usize, #[case] expected: Vec<Option<f64>>) {
        let mut values = vec![Some(1.0)];
        values.extend(std::iter::repeat(None).take(gap));
        values.push(Some(5.0));
        assert_eq!(forward_fill_limited(&values, 2), expected);
    }

    #[test]
    fn test_forward_fill_never_fills_backwards() {
        let values = vec![None, Some(1.0)];
        assert_eq!(forward_fill_limited(&values, 2), vec![None, Some(1.0)]);
    }

    #[test]
    fn test_resample_reindexes_and_fills() {
        let series = CleanSeries {
            timestamps: vec![t(0), t(15), t(30), t(75), t(80), t(90)],
            columns: vec![
                Column::new(
                    "Energy",
                    vec![Some(1.0), Some(2.0), Some(3.0), Some(6.0), Some(99.0), Some(7.0)],
                ),
                Column::new(
                    "Temp",
                    vec![Some(10.0), Some(11.0), Some(12.0), Some(15.0), Some(99.0), Some(16.0)],
                ),
            ],
        };
        let regular = resample(&series, "Energy", &ResampleConfig::default()).unwrap();

        assert_eq!(regular.cadence.step, Duration::minutes(15));
        assert_eq!(regular.len(), 7);
        assert_eq!(regular.timestamps[6], t(90));

        let energy = &regular.column("Energy").unwrap().values;
        assert_eq!(
            energy,
            &vec![Some(1.0), Some(2.0), Some(3.0), Some(3.0), Some(3.0), Some(6.0), Some(7.0)]
        );

        let temp = &regular.column("Temp").unwrap().values;
        assert_eq!(temp[3], Some(13.0));
        assert_eq!(temp[4], Some(14.0));
    }

    #[test]
    fn test_resample_requires_target() {
        let series = CleanSeries {
            timestamps: vec![t(0)],
            columns: vec![Column::new("Temp", vec![Some(1.0)])],
        };
        assert!(matches!(
            resample(&series, "Energy", &ResampleConfig::default()),
            Err(ForecastError::Schema { .. })
        ));
    }
}
