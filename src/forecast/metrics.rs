//! Forecast Metrics and Evaluation
//!
//! MAE, RMSE and R² for one split of one horizon.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// R² (coefficient of determination)
    pub r2: f64,
    /// Number of samples evaluated
    pub sample_count: usize,
}

impl ForecastMetrics {
    /// Calculate metrics from actual and predicted values
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::Metric(format!(
                "dimension mismatch: actual={}, predicted={}",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(ForecastError::Metric("empty data provided".to_string()));
        }

        let n = actual.len() as f64;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        for (a, p) in actual.iter().zip(predicted) {
            let error = a - p;
            abs_sum += error.abs();
            sq_sum += error * error;
        }

        let mae = abs_sum / n;
        let rmse = (sq_sum / n).sqrt();

        let mean_actual = actual.iter().sum::<f64>() / n;
        let total_variance: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();

        // Constant truth: exact predictions score 1, anything else 0
        let r2 = if total_variance == 0.0 {
            if sq_sum == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - sq_sum / total_variance
        };

        Ok(ForecastMetrics {
            mae,
            rmse,
            r2,
            sample_count: actual.len(),
        })
    }

    /// Report lines, e.g. `Val +1h MAE:  0.123456`
    pub fn report(&self, tag: &str) -> String {
        format!(
            "{tag} MAE:  {:.6}\n{tag} RMSE: {:.6}\n{tag} R2:   {:.6}\n",
            self.mae, self.rmse, self.r2
        )
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Metrics: MAE={:.6}, RMSE={:.6}, R²={:.6}, n={}",
            self.mae, self.rmse, self.r2, self.sample_count
        )
    }
}
