use std::fmt::Write as _;
use std::path::Path;

use strum::IntoEnumIterator;
use tracing::info;

use super::dataset::ModelFrame;
use super::features::FeatureBuilder;
use super::metrics::ForecastMetrics;
use super::split::{time_split, SplitFrames};
use super::targets::{build_horizon_targets, Horizon, HorizonSteps};
use crate::config::Config;
use crate::data::{cleaner, loader::CsvLoader, resample};
use crate::domain::{Cadence, RawTable};
use crate::error::Result;
use crate::ml::inference::{forecast_latest, HorizonForecast};
use crate::ml::models::ForecastModel;
use crate::ml::training::ModelTrainer;

/// Everything one horizon produced
#[derive(Debug, Clone)]
pub struct HorizonRun {
    pub horizon: Horizon,
    pub model: ForecastModel,
    pub validation: ForecastMetrics,
    pub test: ForecastMetrics,
    pub forecast: HorizonForecast,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub target: String,
    pub cadence: Cadence,
    pub steps: HorizonSteps,
    /// Model-ready frame the models were fit and evaluated on
    pub frame: ModelFrame,
    pub runs: Vec<HorizonRun>,
}

impl PipelineOutcome {
    pub fn run(&self, horizon: Horizon) -> Option<&HorizonRun> {
        self.runs.iter().find(|r| r.horizon == horizon)
    }

    /// Console report: metrics per split per horizon, then the forecasts
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            let label = run.horizon.label();
            let _ = writeln!(out, "Validation ({label}):");
            out.push_str(&run.validation.report(&format!("Val {label}")));
            let _ = writeln!(out, "Test ({label}):");
            out.push_str(&run.test.report(&format!("Test {label}")));
        }

        out.push_str("\nForecasts from last available time:\n");
        for run in &self.runs {
            let target = &self.target;
            let value = run.forecast.value;
            let _ = match run.horizon {
                Horizon::OneHour => writeln!(out, "Next 1 hour {target}: {value}"),
                Horizon::OneDay => writeln!(out, "Next 1 day {target} : {value}"),
            };
        }
        out
    }
}

/// Load, clean, regularize, featurize, split, train, evaluate, forecast.
pub struct ForecastPipeline {
    config: Config,
}

impl ForecastPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run on the CSV named by `input.csv_path`
    pub fn run(&self) -> Result<PipelineOutcome> {
        let raw = CsvLoader::new(&self.config.input).load_path(&self.config.input.csv_path)?;
        self.run_on_table(raw)
    }

    pub fn run_on_table(&self, raw: RawTable) -> Result<PipelineOutcome> {
        let cfg = &self.config;
        let target = cfg.input.target_column.as_str();

        let (frame, cadence, steps) = self.prepare(raw)?;

        let SplitFrames {
            train,
            validation,
            test,
        } = time_split(&frame, &cfg.split);

        let trainer = ModelTrainer::new(cfg.boosting.clone());
        let mut runs = Vec::new();
        for horizon in Horizon::iter() {
            let model = trainer.train(
                horizon,
                &train.dataset(horizon)?,
                &validation.dataset(horizon)?,
            )?;

            let validation_metrics = ForecastMetrics::calculate(
                validation.labels(horizon),
                &model.predict_rows(&validation.rows)?,
            )?;
            let test_metrics =
                ForecastMetrics::calculate(test.labels(horizon), &model.predict_rows(&test.rows)?)?;
            info!(
                horizon = horizon.label(),
                best_iteration = model.best_iteration(),
                val_rmse = validation_metrics.rmse,
                test_rmse = test_metrics.rmse,
                "horizon evaluated"
            );

            let forecast = forecast_latest(&frame, &model)?;

            if let Some(dir) = &cfg.output.model_dir {
                model.save(export_path(dir, target, horizon))?;
            }

            runs.push(HorizonRun {
                horizon,
                model,
                validation: validation_metrics,
                test: test_metrics,
                forecast,
            });
        }

        Ok(PipelineOutcome {
            target: target.to_string(),
            cadence,
            steps,
            frame,
            runs,
        })
    }

    /// Every stage up to the model-ready frame
    pub fn prepare(&self, raw: RawTable) -> Result<(ModelFrame, Cadence, HorizonSteps)> {
        let cfg = &self.config;
        let target = cfg.input.target_column.as_str();

        let cleaned = cleaner::clean(&raw, &cfg.input.timestamp_column)?;
        let regular = resample::resample(&cleaned, target, &cfg.resample)?;
        let cadence = regular.cadence;

        let features = FeatureBuilder::new(&cfg.features).build(regular, target)?;
        let labelled = build_horizon_targets(features)?;
        let steps = labelled.steps;
        let frame = ModelFrame::from_labelled(&labelled)?;

        info!(
            step_minutes = cadence.step_minutes(),
            steps_per_hour = steps.steps_per_hour,
            steps_per_day = steps.steps_per_day,
            model_ready_rows = frame.len(),
            "dataset prepared"
        );
        Ok((frame, cadence, steps))
    }
}

/// `<dir>/lgbm_<target>_<horizon>.json`
pub fn export_path(dir: &Path, target: &str, horizon: Horizon) -> std::path::PathBuf {
    dir.join(format!(
        "lgbm_{}_{}.json",
        target.to_lowercase(),
        horizon.slug()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::gbdt::{GradientBooster, Objective};
    use crate::ml::ModelMetadata;
    use chrono::{NaiveDate, Utc};

    fn run(horizon: Horizon, value: f64) -> HorizonRun {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let metrics = ForecastMetrics {
            mae: 1.0,
            rmse: 2.0,
            r2: 0.5,
            sample_count: 10,
        };
        HorizonRun {
            horizon,
            model: ForecastModel::new(
                GradientBooster::new(Objective::Regression, value),
                ModelMetadata {
                    model_id: "m".to_string(),
                    horizon,
                    trained_at: Utc::now(),
                    training_samples: 1,
                    validation_samples: 1,
                    best_iteration: 0,
                    best_score: 0.0,
                    feature_names: vec![],
                },
            ),
            validation: metrics,
            test: metrics,
            forecast: HorizonForecast {
                horizon,
                origin,
                value,
            },
        }
    }

    #[test]
    fn test_report_layout() {
        let outcome = PipelineOutcome {
            target: "Energy".to_string(),
            cadence: Cadence::inferred(chrono::Duration::minutes(15)),
            steps: HorizonSteps {
                steps_per_hour: 4,
                steps_per_day: 96,
            },
            frame: ModelFrame {
                timestamps: vec![],
                feature_names: vec![],
                rows: vec![],
                plus_1h: vec![],
                plus_1d: vec![],
            },
            runs: vec![run(Horizon::OneHour, 1.5), run(Horizon::OneDay, 2.25)],
        };

        let report = outcome.render_report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Validation (+1h):");
        assert_eq!(lines[1], "Val +1h MAE:  1.000000");
        assert_eq!(lines[4], "Test (+1h):");
        assert_eq!(lines[6], "Test +1h RMSE: 2.000000");
        assert_eq!(lines[8], "Validation (+1d):");
        assert!(report.contains("Test +1d R2:   0.500000"));
        assert!(report.ends_with(
            "Forecasts from last available time:\nNext 1 hour Energy: 1.5\nNext 1 day Energy : 2.25\n"
        ));
        assert_eq!(outcome.run(Horizon::OneDay).unwrap().forecast.value, 2.25);
    }

    #[test]
    fn test_export_path() {
        assert_eq!(
            export_path(Path::new("models"), "Energy", Horizon::OneHour),
            Path::new("models/lgbm_energy_plus1h.json")
        );
        assert_eq!(
            export_path(Path::new("models"), "Energy", Horizon::OneDay),
            Path::new("models/lgbm_energy_plus1d.json")
        );
    }
}
