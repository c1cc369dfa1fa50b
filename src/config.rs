use crate::error::{ForecastError, Result};
use crate::ml::training::TrainingConfig;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/forecast.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub input: InputConfig,
    pub resample: ResampleConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub boosting: TrainingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub csv_path: PathBuf,
    pub timestamp_column: String,
    pub target_column: String,
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("your_data.csv"),
            timestamp_column: "timestamp".to_string(),
            target_column: "Energy".to_string(),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleConfig {
    /// Cadence used when fewer than two timestamps survive cleaning
    pub default_step_minutes: i64,
    /// Longest covariate gap (in steps) that is interpolated
    pub covariate_interp_limit: usize,
    /// Longest target gap (in steps) that is forward-filled
    pub target_ffill_limit: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            default_step_minutes: 15,
            covariate_interp_limit: 4,
            target_ffill_limit: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Lags in grid steps
    pub lags: Vec<usize>,
    /// Trailing rolling windows in grid steps
    pub windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3, 4, 6, 12, 24, 48, 96],
            windows: vec![4, 12, 24, 48],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_ratio: f64,
    pub val_ratio: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.15,
            val_ratio: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory receiving exported models; no export when unset
    pub model_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Defaults overlaid with the TOML file at `path` (a missing file is ignored)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path.as_ref())),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let split = &self.split;
        if !(0.0..1.0).contains(&split.test_ratio) || !(0.0..1.0).contains(&split.val_ratio) {
            return Err(ForecastError::Config(
                "split ratios must lie in [0, 1)".to_string(),
            ));
        }
        if split.test_ratio + split.val_ratio >= 1.0 {
            return Err(ForecastError::Config(format!(
                "test_ratio + val_ratio must be < 1 (got {})",
                split.test_ratio + split.val_ratio
            )));
        }

        if self.features.lags.is_empty() || self.features.windows.is_empty() {
            return Err(ForecastError::Config(
                "at least one lag and one rolling window are required".to_string(),
            ));
        }
        if self.features.lags.contains(&0) || self.features.windows.contains(&0) {
            return Err(ForecastError::Config(
                "lags and windows must be positive".to_string(),
            ));
        }

        if self.resample.default_step_minutes <= 0 {
            return Err(ForecastError::Config(
                "default_step_minutes must be positive".to_string(),
            ));
        }

        if self.input.timestamp_column == self.input.target_column {
            return Err(ForecastError::Config(
                "timestamp and target columns must differ".to_string(),
            ));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(ForecastError::Config(
                "delimiter must be a single ASCII character".to_string(),
            ));
        }

        self.boosting.validate()
    }
}
