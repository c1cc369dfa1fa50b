//! Chronological train/validation/test partitioning

use super::dataset::ModelFrame;
use crate::config::SplitConfig;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitFrames {
    pub train: ModelFrame,
    pub validation: ModelFrame,
    pub test: ModelFrame,
}

/// `(val_start, test_start)` row indices for `n` rows
pub fn split_bounds(n: usize, config: &SplitConfig) -> (usize, usize) {
    let test_start = (n as f64 * (1.0 - config.test_ratio)) as usize;
    let val_start = (n as f64 * (1.0 - config.test_ratio - config.val_ratio)) as usize;
    (val_start.min(test_start), test_start.min(n))
}

/// Earliest rows train, the next block validates, the latest rows test.
/// No shuffling.
pub fn time_split(frame: &ModelFrame, config: &SplitConfig) -> SplitFrames {
    let n = frame.len();
    let (val_start, test_start) = split_bounds(n, config);

    let split = SplitFrames {
        train: frame.slice(0..val_start),
        validation: frame.slice(val_start..test_start),
        test: frame.slice(test_start..n),
    };
    info!(
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        "chronological split"
    );
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, (70, 85))]
    #[case(2688, (1881, 2284))]
    #[case(10, (7, 8))]
    #[case(1, (0, 0))]
    #[case(0, (0, 0))]
    fn test_split_bounds(#[case] n: usize, #[case] expected: (usize, usize)) {
        assert_eq!(split_bounds(n, &SplitConfig::default()), expected);
    }

    #[test]
    fn test_partitions_are_ordered_and_cover_everything() {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let n = 40;
        let frame = ModelFrame {
            timestamps: (0..n)
                .map(|i| start + chrono::Duration::minutes(15 * i as i64))
                .collect(),
            feature_names: vec!["x".into()],
            rows: (0..n).map(|i| vec![i as f64]).collect(),
            plus_1h: vec![0.0; n],
            plus_1d: vec![0.0; n],
        };

        let split = time_split(&frame, &SplitConfig::default());
        assert_eq!(
            split.train.len() + split.validation.len() + split.test.len(),
            n
        );
        assert!(split.train.timestamps.last() < split.validation.timestamps.first());
        assert!(split.validation.timestamps.last() < split.test.timestamps.first());
        assert_eq!(split.test.rows[0][0], 34.0);
    }
}
