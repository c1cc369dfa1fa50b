pub mod dataset;
pub mod engine;
pub mod features;
pub mod metrics;
pub mod split;
pub mod targets;

pub use engine::*;
pub use metrics::ForecastMetrics;
pub use targets::{Horizon, HorizonSteps};
