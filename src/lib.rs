//! Energy-meter forecasting pipeline: gradient-boosted +1 hour and +1 day
//! forecasts from a single meter's history.

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod telemetry;

pub use error::{ForecastError, Result};
