//! Horizon labels: the target shifted one hour and one day ahead

use super::features::FeatureFrame;
use crate::domain::{Cadence, Column};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};
use tracing::{info, warn};

/// Minutes assumed when the cadence floors to zero whole minutes
const SUB_MINUTE_FALLBACK_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum Horizon {
    OneHour,
    OneDay,
}

impl Horizon {
    /// Short tag used in reports, e.g. `+1h`
    pub fn label(self) -> &'static str {
        match self {
            Horizon::OneHour => "+1h",
            Horizon::OneDay => "+1d",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Horizon::OneHour => "plus1h",
            Horizon::OneDay => "plus1d",
        }
    }

    pub fn column_name(self, target: &str) -> String {
        match self {
            Horizon::OneHour => format!("{target}_t_plus_1h"),
            Horizon::OneDay => format!("{target}_t_plus_1d"),
        }
    }

    pub fn steps(self, steps: &HorizonSteps) -> usize {
        match self {
            Horizon::OneHour => steps.steps_per_hour,
            Horizon::OneDay => steps.steps_per_day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonSteps {
    pub steps_per_hour: usize,
    pub steps_per_day: usize,
}

impl HorizonSteps {
    pub fn from_cadence(cadence: &Cadence) -> Self {
        let mut step_minutes = cadence.step_minutes();
        if step_minutes <= 0 {
            warn!(
                step_seconds = cadence.step.num_seconds(),
                fallback_minutes = SUB_MINUTE_FALLBACK_MINUTES,
                "sub-minute cadence, horizon steps computed from fallback"
            );
            step_minutes = SUB_MINUTE_FALLBACK_MINUTES;
        }

        let steps_per_hour = ((60.0 / step_minutes as f64).round_ties_even() as usize).max(1);
        Self {
            steps_per_hour,
            steps_per_day: steps_per_hour * 24,
        }
    }
}

/// Feature frame with both horizon label columns attached
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledFrame {
    pub frame: FeatureFrame,
    pub steps: HorizonSteps,
}

impl LabelledFrame {
    pub fn label_column(&self, horizon: Horizon) -> Option<&Column> {
        self.frame.column(&horizon.column_name(&self.frame.target))
    }
}

/// `values[t + steps]`, missing for the last `steps` rows
pub fn shift_forward(values: &[Option<f64>], steps: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| values.get(t + steps).copied().flatten())
        .collect()
}

pub fn build_horizon_targets(mut frame: FeatureFrame) -> Result<LabelledFrame> {
    let steps = HorizonSteps::from_cadence(&frame.cadence);
    let target_values = frame
        .column(&frame.target)
        .ok_or_else(|| ForecastError::missing_column(frame.target.as_str()))?
        .values
        .clone();

    for horizon in Horizon::iter() {
        let labels = shift_forward(&target_values, horizon.steps(&steps));
        frame
            .columns
            .push(Column::new(horizon.column_name(&frame.target), labels));
    }

    info!(
        steps_per_hour = steps.steps_per_hour,
        steps_per_day = steps.steps_per_day,
        "horizon targets built"
    );
    Ok(LabelledFrame { frame, steps })
}
