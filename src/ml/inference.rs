//! ML Model Inference
//!
//! Forecasts are produced from the most recent model-ready row, i.e. the
//! last row with every feature present.

use super::models::{ForecastModel, MLModel};
use crate::error::{ForecastError, Result};
use crate::forecast::dataset::ModelFrame;
use crate::forecast::targets::Horizon;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub horizon: Horizon,
    /// Timestamp of the row the forecast was made from
    pub origin: NaiveDateTime,
    pub value: f64,
}

/// Apply `model` to the latest fully-featured row of `frame`
pub fn forecast_latest(frame: &ModelFrame, model: &ForecastModel) -> Result<HorizonForecast> {
    let (origin, features) = frame.latest().ok_or_else(|| {
        ForecastError::InsufficientData(
            "no fully-featured row is available for inference".to_string(),
        )
    })?;

    let prediction = model.predict(&features)?;
    let horizon = model.metadata().horizon;
    info!(
        horizon = horizon.label(),
        origin = %origin,
        value = prediction.value,
        iterations = prediction.iterations,
        "forecast produced"
    );

    Ok(HorizonForecast {
        horizon,
        origin,
        value: prediction.value,
    })
}
