//! Machine Learning Module
//!
//! Gradient-boosted regression trees for the +1h and +1d consumption
//! horizons:
//! - `gbdt`: histogram binning, leaf-wise tree growth, the boosted ensemble
//! - `training`: boosting loop with bagging and early stopping
//! - `models`: trained model wrapper, JSON export/import
//! - `inference`: forecasts from the latest fully-featured row

use crate::error::{ForecastError, Result};
use crate::forecast::targets::Horizon;
use serde::{Deserialize, Serialize};

pub mod gbdt;
pub mod inference;
pub mod models;
pub mod training;

/// ML Model Metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub horizon: Horizon,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_samples: usize,
    /// 1-based boosting round selected by early stopping
    pub best_iteration: usize,
    /// Validation loss at `best_iteration`
    pub best_score: f64,
    pub feature_names: Vec<String>,
}

/// Feature Vector for ML models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, feature_names: Vec<String>) -> Result<Self> {
        if features.len() != feature_names.len() {
            return Err(ForecastError::FeatureMismatch {
                expected: feature_names.len(),
                got: features.len(),
            });
        }
        Ok(Self {
            features,
            feature_names,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// ML Prediction Result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    /// Number of boosting rounds used
    pub iterations: usize,
}

impl Prediction {
    pub fn new(value: f64, iterations: usize) -> Self {
        Self { value, iterations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_creation() {
        let features = vec![1.0, 2.0, 3.0];
        let names = vec!["f1".to_string(), "f2".to_string(), "f3".to_string()];

        let fv = FeatureVector::new(features, names).unwrap();
        assert_eq!(fv.len(), 3);
        assert!(!fv.is_empty());
    }

    #[test]
    fn test_feature_vector_length_mismatch() {
        let err = FeatureVector::new(vec![1.0], vec![]).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::FeatureMismatch {
                expected: 0,
                got: 1
            }
        ));
    }
}
