//! ML Model Training Pipeline
//!
//! Boosting loop for one horizon: gradient computation, optional row
//! bagging and per-tree feature subsampling, early stopping on the
//! validation metric.

use super::gbdt::{BinnedMatrix, GradientBooster, Metric, Objective, TreeLearner, TreeParams};
use super::models::ForecastModel;
use super::ModelMetadata;
use crate::error::{ForecastError, Result};
use crate::forecast::targets::Horizon;
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Training Dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingDataset {
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(ForecastError::Training(format!(
                "feature and target count mismatch: {} rows, {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != feature_names.len()) {
            return Err(ForecastError::Training(format!(
                "row {bad} has {} features, expected {}",
                rows[bad].len(),
                feature_names.len()
            )));
        }
        Ok(Self {
            feature_names,
            rows,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// Training Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub objective: Objective,
    pub metric: Metric,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub feature_fraction: f64,
    pub bagging_fraction: f64,
    /// Re-draw the bag every `bagging_freq` rounds; 0 disables bagging
    pub bagging_freq: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    pub max_bin: usize,
    pub num_boost_round: usize,
    /// 0 disables early stopping
    pub early_stopping_rounds: usize,
    pub seed: u64,
    /// Log train/valid loss every `log_every` rounds; 0 silences progress
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            objective: Objective::Regression,
            metric: Metric::L2,
            learning_rate: 0.05,
            num_leaves: 64,
            feature_fraction: 0.9,
            bagging_fraction: 0.8,
            bagging_freq: 1,
            min_data_in_leaf: 40,
            min_sum_hessian_in_leaf: 1e-3,
            lambda_l2: 0.0,
            max_bin: 255,
            num_boost_round: 5000,
            early_stopping_rounds: 200,
            seed: 42,
            log_every: 200,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(ForecastError::Config(format!("boosting: {msg}")));

        if !(self.learning_rate > 0.0) {
            return fail("learning_rate must be positive");
        }
        if self.num_leaves < 2 {
            return fail("num_leaves must be at least 2");
        }
        for (name, value) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return fail(&format!("{name} must lie in (0, 1]"));
            }
        }
        if !(2..=255).contains(&self.max_bin) {
            return fail("max_bin must lie in [2, 255]");
        }
        if self.num_boost_round == 0 {
            return fail("num_boost_round must be positive");
        }
        if self.lambda_l2 < 0.0 || self.min_sum_hessian_in_leaf < 0.0 {
            return fail("regularisation terms must be non-negative");
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            num_leaves: self.num_leaves,
            min_data_in_leaf: self.min_data_in_leaf,
            min_sum_hessian_in_leaf: self.min_sum_hessian_in_leaf,
            lambda_l2: self.lambda_l2,
            learning_rate: self.learning_rate,
        }
    }

    fn bagging_enabled(&self) -> bool {
        self.bagging_freq > 0 && self.bagging_fraction < 1.0
    }
}

/// Mean absolute and mean squared error of one score vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossPair {
    pub l1: f64,
    pub l2: f64,
}

impl LossPair {
    pub fn evaluate(labels: &[f64], scores: &[f64]) -> Self {
        Self {
            l1: Metric::L1.evaluate(labels, scores),
            l2: Metric::L2.evaluate(labels, scores),
        }
    }
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit one model, stopping once the validation loss has not improved
    /// for `early_stopping_rounds` rounds.
    pub fn train(
        &self,
        horizon: Horizon,
        train: &TrainingDataset,
        valid: &TrainingDataset,
    ) -> Result<ForecastModel> {
        self.check_inputs(train, valid)?;
        let cfg = &self.config;

        let data = BinnedMatrix::from_rows(&train.rows, cfg.max_bin);
        let learner = TreeLearner::new(&data, cfg.tree_params());
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let n = train.len();
        let n_features = train.n_features();
        let bag_size = ((n as f64 * cfg.bagging_fraction) as usize).clamp(1, n);
        let feature_count =
            ((n_features as f64 * cfg.feature_fraction + 0.5) as usize).clamp(1, n_features);

        let init_score = cfg.objective.init_score(&train.targets);
        let mut booster = GradientBooster::new(cfg.objective, init_score);
        let mut train_scores = vec![init_score; n];
        let mut valid_scores = vec![init_score; valid.len()];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut bag: Vec<u32> = (0..n as u32).collect();

        let mut best_score = f64::INFINITY;
        let mut best_iteration = 0;

        info!(
            horizon = horizon.label(),
            train_rows = n,
            valid_rows = valid.len(),
            features = n_features,
            "training gradient-boosted model"
        );

        for round in 1..=cfg.num_boost_round {
            for (i, (score, label)) in train_scores.iter().zip(&train.targets).enumerate() {
                let (g, h) = cfg.objective.gradients(*score, *label);
                grad[i] = g;
                hess[i] = h;
            }

            if cfg.bagging_enabled() && (round - 1) % cfg.bagging_freq == 0 {
                let mut sampled: Vec<u32> = index::sample(&mut rng, n, bag_size)
                    .into_iter()
                    .map(|i| i as u32)
                    .collect();
                sampled.sort_unstable();
                bag = sampled;
            }

            let mut features = index::sample(&mut rng, n_features, feature_count).into_vec();
            features.sort_unstable();

            let (mut tree, leaves) = learner.grow(&grad, &hess, bag.clone(), &features);
            if tree.num_leaves() < 2 {
                warn!(
                    horizon = horizon.label(),
                    round, "no split improves the loss, stopping"
                );
                break;
            }

            if cfg.objective == Objective::RegressionL1 {
                for leaf in &leaves {
                    let residuals = leaf
                        .rows
                        .iter()
                        .map(|&r| train.targets[r as usize] - train_scores[r as usize])
                        .collect();
                    tree.set_leaf_value(
                        leaf.node,
                        super::gbdt::median(residuals) * cfg.learning_rate,
                    );
                }
            }

            for (score, row) in train_scores.iter_mut().zip(&train.rows) {
                *score += tree.predict(row);
            }
            for (score, row) in valid_scores.iter_mut().zip(&valid.rows) {
                *score += tree.predict(row);
            }
            booster.trees.push(tree);

            let valid_loss = cfg.metric.evaluate(&valid.targets, &valid_scores);
            if cfg.log_every > 0 && round % cfg.log_every == 0 {
                let train_losses = LossPair::evaluate(&train.targets, &train_scores);
                let valid_losses = LossPair::evaluate(&valid.targets, &valid_scores);
                info!(
                    horizon = horizon.label(),
                    round,
                    train_l1 = train_losses.l1,
                    train_l2 = train_losses.l2,
                    valid_l1 = valid_losses.l1,
                    valid_l2 = valid_losses.l2,
                    "boosting progress"
                );
            }

            if valid_loss < best_score {
                best_score = valid_loss;
                best_iteration = round;
            } else if cfg.early_stopping_rounds > 0
                && round - best_iteration >= cfg.early_stopping_rounds
            {
                debug!(round, best_iteration, "early stopping triggered");
                break;
            }
        }

        if cfg.early_stopping_rounds == 0 {
            best_iteration = booster.num_trees();
            best_score = cfg.metric.evaluate(&valid.targets, &valid_scores);
        }
        if best_iteration == 0 {
            best_score = cfg.metric.evaluate(&valid.targets, &valid_scores);
        }

        info!(
            horizon = horizon.label(),
            best_iteration,
            best_score,
            trees = booster.num_trees(),
            "training finished"
        );

        let metadata = ModelMetadata {
            model_id: format!("gbdt_{}_{}", horizon.slug(), uuid::Uuid::new_v4()),
            horizon,
            trained_at: chrono::Utc::now(),
            training_samples: n,
            validation_samples: valid.len(),
            best_iteration,
            best_score,
            feature_names: train.feature_names.clone(),
        };

        Ok(ForecastModel::new(booster, metadata))
    }

    fn check_inputs(&self, train: &TrainingDataset, valid: &TrainingDataset) -> Result<()> {
        if train.is_empty() {
            return Err(ForecastError::Training("training set is empty".to_string()));
        }
        if valid.is_empty() {
            return Err(ForecastError::Training(
                "validation set is empty".to_string(),
            ));
        }
        if train.n_features() == 0 {
            return Err(ForecastError::Training(
                "training set has no feature columns".to_string(),
            ));
        }
        if train.n_features() != valid.n_features() {
            return Err(ForecastError::Training(format!(
                "train has {} feature columns, validation has {}",
                train.n_features(),
                valid.n_features()
            )));
        }
        Ok(())
    }
}
