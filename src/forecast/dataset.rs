//! Model-ready rows: every column present, features packed row-major

use super::targets::{Horizon, LabelledFrame};
use crate::error::{ForecastError, Result};
use crate::ml::training::TrainingDataset;
use crate::ml::FeatureVector;
use chrono::NaiveDateTime;
use std::ops::Range;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFrame {
    pub timestamps: Vec<NaiveDateTime>,
    pub feature_names: Vec<String>,
    /// One feature vector per row, in `feature_names` order
    pub rows: Vec<Vec<f64>>,
    pub plus_1h: Vec<f64>,
    pub plus_1d: Vec<f64>,
}

impl ModelFrame {
    /// Keep rows with no missing or non-finite value in any column (source,
    /// engineered or label). Leading rows lack lags, trailing rows lack labels.
    pub fn from_labelled(labelled: &LabelledFrame) -> Result<Self> {
        let frame = &labelled.frame;

        let feature_columns = frame
            .feature_names
            .iter()
            .map(|name| {
                frame
                    .column(name)
                    .map(|c| &c.values)
                    .ok_or_else(|| ForecastError::missing_column(name.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;
        let label_column = |h: Horizon| {
            labelled
                .label_column(h)
                .map(|c| &c.values)
                .ok_or_else(|| ForecastError::missing_column(h.column_name(&frame.target)))
        };
        let label_1h = label_column(Horizon::OneHour)?;
        let label_1d = label_column(Horizon::OneDay)?;

        let mut out = ModelFrame {
            timestamps: Vec::new(),
            feature_names: frame.feature_names.clone(),
            rows: Vec::new(),
            plus_1h: Vec::new(),
            plus_1d: Vec::new(),
        };

        for t in 0..frame.len() {
            if frame
                .columns
                .iter()
                .any(|c| c.values[t].map_or(true, |v| !v.is_finite()))
            {
                continue;
            }
            out.timestamps.push(frame.timestamps[t]);
            out.rows
                .push(feature_columns.iter().filter_map(|c| c[t]).collect());
            out.plus_1h.extend(label_1h[t]);
            out.plus_1d.extend(label_1d[t]);
        }

        info!(
            model_ready = out.len(),
            total = frame.len(),
            "model-ready rows selected"
        );
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self, horizon: Horizon) -> &[f64] {
        match horizon {
            Horizon::OneHour => &self.plus_1h,
            Horizon::OneDay => &self.plus_1d,
        }
    }

    /// Contiguous block of rows, preserving order
    pub fn slice(&self, range: Range<usize>) -> ModelFrame {
        ModelFrame {
            timestamps: self.timestamps[range.clone()].to_vec(),
            feature_names: self.feature_names.clone(),
            rows: self.rows[range.clone()].to_vec(),
            plus_1h: self.plus_1h[range.clone()].to_vec(),
            plus_1d: self.plus_1d[range].to_vec(),
        }
    }

    pub fn dataset(&self, horizon: Horizon) -> Result<TrainingDataset> {
        TrainingDataset::new(
            self.feature_names.clone(),
            self.rows.clone(),
            self.labels(horizon).to_vec(),
        )
    }

    /// Feature vector of the most recent row
    pub fn latest(&self) -> Option<(NaiveDateTime, FeatureVector)> {
        let last = self.len().checked_sub(1)?;
        let features = FeatureVector::new(self.rows[last].clone(), self.feature_names.clone()).ok()?;
        Some((self.timestamps[last], features))
    }
}
