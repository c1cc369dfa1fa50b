//! ML Model Definitions
//!
//! A trained horizon model is the boosted ensemble plus the metadata needed
//! to reproduce its predictions: feature order and the early-stopping round.

use super::gbdt::GradientBooster;
use super::{FeatureVector, ModelMetadata, Prediction};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Trait for ML models
pub trait MLModel: Send + Sync {
    /// Predict a value from features
    fn predict(&self, features: &FeatureVector) -> Result<Prediction>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    pub metadata: ModelMetadata,
    booster: GradientBooster,
}

impl ForecastModel {
    pub fn new(booster: GradientBooster, metadata: ModelMetadata) -> Self {
        Self { metadata, booster }
    }

    pub fn booster(&self) -> &GradientBooster {
        &self.booster
    }

    pub fn num_trees(&self) -> usize {
        self.booster.num_trees()
    }

    pub fn best_iteration(&self) -> usize {
        self.metadata.best_iteration
    }

    /// Predictions at the early-stopping round for a batch of rows
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let expected = self.metadata.feature_names.len();
        rows.iter()
            .map(|row| {
                if row.len() != expected {
                    return Err(ForecastError::FeatureMismatch {
                        expected,
                        got: row.len(),
                    });
                }
                Ok(self.booster.predict_row(row, self.best_iteration()))
            })
            .collect()
    }

    /// Write the model as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), model_id = %self.metadata.model_id, "model exported");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl MLModel for ForecastModel {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        if features.feature_names != self.metadata.feature_names {
            return Err(ForecastError::FeatureMismatch {
                expected: self.metadata.feature_names.len(),
                got: features.len(),
            });
        }
        let value = self
            .booster
            .predict_row(&features.features, self.best_iteration());
        Ok(Prediction::new(value, self.best_iteration()))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
