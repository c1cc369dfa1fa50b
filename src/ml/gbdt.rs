//! Histogram gradient-boosted regression trees
//!
//! Features are bucketed into at most `max_bin` bins fitted on the training
//! matrix. Trees grow leaf-wise: the leaf with the largest split gain is
//! split next until `num_leaves` is reached or no split improves the loss.
//! Split thresholds are stored as raw feature values so a trained ensemble
//! predicts on unbinned rows.

use serde::{Deserialize, Serialize};

const K_EPSILON: f64 = 1e-15;

/// Training loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Squared error
    Regression,
    /// Absolute error
    RegressionL1,
}

impl Objective {
    /// Constant the ensemble starts from
    pub fn init_score(self, labels: &[f64]) -> f64 {
        match self {
            Objective::Regression => labels.iter().sum::<f64>() / labels.len().max(1) as f64,
            Objective::RegressionL1 => median(labels.to_vec()),
        }
    }

    /// First and second derivatives of the loss at `score`
    pub fn gradients(self, score: f64, label: f64) -> (f64, f64) {
        let diff = score - label;
        match self {
            Objective::Regression => (diff, 1.0),
            Objective::RegressionL1 => {
                let sign = if diff > 0.0 {
                    1.0
                } else if diff < 0.0 {
                    -1.0
                } else {
                    0.0
                };
                (sign, 1.0)
            }
        }
    }
}

/// Validation loss monitored by early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Mean absolute error
    L1,
    /// Mean squared error
    L2,
}

impl Metric {
    pub fn evaluate(self, labels: &[f64], scores: &[f64]) -> f64 {
        let n = labels.len().max(1) as f64;
        let total: f64 = labels
            .iter()
            .zip(scores)
            .map(|(y, p)| match self {
                Metric::L1 => (p - y).abs(),
                Metric::L2 => (p - y).powi(2),
            })
            .sum();
        total / n
    }
}

pub(crate) fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Maps raw values of one feature to bin indices.
///
/// Bin `k` holds values `v <= upper_bounds[k]`; the last bound is infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    upper_bounds: Vec<f64>,
}

impl BinMapper {
    pub fn fit(values: &[f64], max_bin: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);
        let mut distinct = sorted.clone();
        distinct.dedup();

        let mut upper_bounds = Vec::new();
        if distinct.len() <= max_bin {
            upper_bounds.extend(distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0));
        } else {
            // Equal-frequency cut points over the full sample
            for k in 1..max_bin {
                let v = sorted[k * sorted.len() / max_bin];
                let j = distinct.partition_point(|&x| x < v);
                if j == 0 {
                    continue;
                }
                let bound = (distinct[j - 1] + distinct[j]) / 2.0;
                if upper_bounds.last().map_or(true, |&last| bound > last) {
                    upper_bounds.push(bound);
                }
            }
        }
        upper_bounds.push(f64::INFINITY);

        Self { upper_bounds }
    }

    pub fn num_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    pub fn bin(&self, value: f64) -> u8 {
        self.upper_bounds.partition_point(|&ub| ub < value) as u8
    }

    pub fn threshold(&self, bin: usize) -> f64 {
        self.upper_bounds[bin]
    }
}

/// Column-major binned copy of a feature matrix
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    mappers: Vec<BinMapper>,
    bins: Vec<Vec<u8>>,
    n_rows: usize,
}

impl BinnedMatrix {
    pub fn from_rows(rows: &[Vec<f64>], max_bin: usize) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut mappers = Vec::with_capacity(n_features);
        let mut bins = Vec::with_capacity(n_features);

        for f in 0..n_features {
            let column: Vec<f64> = rows.iter().map(|r| r[f]).collect();
            let mapper = BinMapper::fit(&column, max_bin);
            bins.push(column.iter().map(|&v| mapper.bin(v)).collect());
            mappers.push(mapper);
        }

        Self {
            mappers,
            bins,
            n_rows: rows.len(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.mappers.len()
    }

    pub fn mapper(&self, feature: usize) -> &BinMapper {
        &self.mappers[feature]
    }

    fn bin(&self, feature: usize, row: u32) -> usize {
        self.bins[feature][row as usize] as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn set_leaf_value(&mut self, node: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(node) {
            *value = new_value;
        }
    }
}

/// Per-tree growth limits
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub num_leaves: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
    left_grad: f64,
    left_hess: f64,
}

struct LeafState {
    node: usize,
    rows: Vec<u32>,
    grad: f64,
    hess: f64,
    best: Option<SplitCandidate>,
}

/// Rows that ended up in one leaf of a freshly grown tree
pub struct LeafRows {
    pub node: usize,
    pub rows: Vec<u32>,
}

pub struct TreeLearner<'a> {
    data: &'a BinnedMatrix,
    params: TreeParams,
}

impl<'a> TreeLearner<'a> {
    pub fn new(data: &'a BinnedMatrix, params: TreeParams) -> Self {
        Self { data, params }
    }

    /// Grow one tree on `rows` using only `features`
    pub fn grow(
        &self,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<u32>,
        features: &[usize],
    ) -> (RegressionTree, Vec<LeafRows>) {
        let (g, h) = sums(&rows, grad, hess);
        let mut nodes = vec![Node::Leaf {
            value: self.leaf_output(g, h),
        }];
        let best = self.best_split(&rows, grad, hess, g, h, features);
        let mut leaves = vec![LeafState {
            node: 0,
            rows,
            grad: g,
            hess: h,
            best,
        }];

        while leaves.len() < self.params.num_leaves {
            let Some((idx, split)) = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, leaf)| leaf.best.map(|b| (i, b)))
                .max_by(|a, b| a.1.gain.total_cmp(&b.1.gain))
            else {
                break;
            };

            let leaf = leaves.swap_remove(idx);
            let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = leaf
                .rows
                .into_iter()
                .partition(|&r| self.data.bin(split.feature, r) <= split.bin);

            let left_grad = split.left_grad;
            let left_hess = split.left_hess;
            let right_grad = leaf.grad - left_grad;
            let right_hess = leaf.hess - left_hess;

            let left_node = nodes.len();
            nodes.push(Node::Leaf {
                value: self.leaf_output(left_grad, left_hess),
            });
            let right_node = nodes.len();
            nodes.push(Node::Leaf {
                value: self.leaf_output(right_grad, right_hess),
            });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: self.data.mapper(split.feature).threshold(split.bin),
                left: left_node,
                right: right_node,
            };

            for (node, rows, g, h) in [
                (left_node, left_rows, left_grad, left_hess),
                (right_node, right_rows, right_grad, right_hess),
            ] {
                let best = self.best_split(&rows, grad, hess, g, h, features);
                leaves.push(LeafState {
                    node,
                    rows,
                    grad: g,
                    hess: h,
                    best,
                });
            }
        }

        let leaf_rows = leaves
            .into_iter()
            .map(|l| LeafRows {
                node: l.node,
                rows: l.rows,
            })
            .collect();
        (RegressionTree { nodes }, leaf_rows)
    }

    fn leaf_output(&self, grad: f64, hess: f64) -> f64 {
        -grad / (hess + self.params.lambda_l2) * self.params.learning_rate
    }

    fn score(&self, grad: f64, hess: f64) -> f64 {
        grad * grad / (hess + self.params.lambda_l2)
    }

    fn best_split(
        &self,
        rows: &[u32],
        grad: &[f64],
        hess: &[f64],
        total_grad: f64,
        total_hess: f64,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let min_data = self.params.min_data_in_leaf.max(1);
        if rows.len() < 2 * min_data {
            return None;
        }

        let parent = self.score(total_grad, total_hess);
        let mut best: Option<SplitCandidate> = None;

        for &feature in features {
            let n_bins = self.data.mapper(feature).num_bins();
            if n_bins < 2 {
                continue;
            }

            let mut hist = vec![(0.0f64, 0.0f64, 0usize); n_bins];
            for &r in rows {
                let slot = &mut hist[self.data.bin(feature, r)];
                slot.0 += grad[r as usize];
                slot.1 += hess[r as usize];
                slot.2 += 1;
            }

            let (mut left_grad, mut left_hess, mut left_count) = (0.0, 0.0, 0usize);
            for (bin, &(g, h, c)) in hist.iter().enumerate().take(n_bins - 1) {
                left_grad += g;
                left_hess += h;
                left_count += c;

                if left_count < min_data {
                    continue;
                }
                if rows.len() - left_count < min_data {
                    break;
                }
                let right_hess = total_hess - left_hess;
                if left_hess < self.params.min_sum_hessian_in_leaf
                    || right_hess < self.params.min_sum_hessian_in_leaf
                {
                    continue;
                }

                let gain = self.score(left_grad, left_hess)
                    + self.score(total_grad - left_grad, right_hess)
                    - parent;
                if gain > K_EPSILON && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        bin,
                        gain,
                        left_grad,
                        left_hess,
                    });
                }
            }
        }

        best
    }
}

fn sums(rows: &[u32], grad: &[f64], hess: &[f64]) -> (f64, f64) {
    rows.iter().fold((0.0, 0.0), |(g, h), &r| {
        (g + grad[r as usize], h + hess[r as usize])
    })
}

/// Additive ensemble of regression trees on top of a constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBooster {
    pub objective: Objective,
    pub init_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBooster {
    pub fn new(objective: Objective, init_score: f64) -> Self {
        Self {
            objective,
            init_score,
            trees: Vec::new(),
        }
    }

    /// Prediction using the first `num_iteration` trees
    pub fn predict_row(&self, row: &[f64], num_iteration: usize) -> f64 {
        self.init_score
            + self
                .trees
                .iter()
                .take(num_iteration)
                .map(|t| t.predict(row))
                .sum::<f64>()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(num_leaves: usize, min_data: usize) -> TreeParams {
        TreeParams {
            num_leaves,
            min_data_in_leaf: min_data,
            min_sum_hessian_in_leaf: 1e-3,
            lambda_l2: 0.0,
            learning_rate: 1.0,
        }
    }

    #[test]
    fn test_bin_mapper_few_distinct_values() {
        let mapper = BinMapper::fit(&[3.0, 1.0, 2.0, 2.0, 1.0], 255);
        assert_eq!(mapper.num_bins(), 3);
        assert_eq!(mapper.bin(1.0), 0);
        assert_eq!(mapper.bin(2.0), 1);
        assert_eq!(mapper.bin(3.0), 2);
        assert_eq!(mapper.bin(100.0), 2);
        assert_eq!(mapper.threshold(0), 1.5);
    }

    #[test]
    fn test_bin_mapper_caps_bins() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let mapper = BinMapper::fit(&values, 16);
        assert!(mapper.num_bins() <= 16);
        assert!(mapper.num_bins() > 8);
        // monotone mapping
        let bins: Vec<u8> = values.iter().map(|&v| mapper.bin(v)).collect();
        assert!(bins.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_bin_threshold_agrees_with_raw_comparison() {
        let values: Vec<f64> = (0..500).map(|i| ((i * 37) % 101) as f64 * 0.1).collect();
        let mapper = BinMapper::fit(&values, 32);
        for k in 0..mapper.num_bins() - 1 {
            let threshold = mapper.threshold(k);
            for &v in &values {
                assert_eq!(mapper.bin(v) as usize <= k, v <= threshold);
            }
        }
    }

    #[test]
    fn test_single_split_recovers_step_function() {
        let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64]).collect();
        let labels: Vec<f64> = (0..100).map(|i| if i < 50 { 0.0 } else { 10.0 }).collect();
        let data = BinnedMatrix::from_rows(&rows, 255);

        let init = Objective::Regression.init_score(&labels);
        let (grad, hess): (Vec<f64>, Vec<f64>) = labels
            .iter()
            .map(|&y| Objective::Regression.gradients(init, y))
            .unzip();

        let learner = TreeLearner::new(&data, params(2, 5));
        let (tree, leaves) = learner.grow(&grad, &hess, (0..100).collect(), &[0]);

        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(leaves.len(), 2);
        assert!((init + tree.predict(&[10.0]) - 0.0).abs() < 1e-9);
        assert!((init + tree.predict(&[80.0]) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_data_in_leaf_blocks_splits() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let grad: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let hess = vec![1.0; 10];
        let data = BinnedMatrix::from_rows(&rows, 255);

        let learner = TreeLearner::new(&data, params(8, 6));
        let (tree, _) = learner.grow(&grad, &hess, (0..10).collect(), &[0]);
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn test_leaf_count_capped() {
        let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let grad: Vec<f64> = (0..200).map(|i| ((i as f64) * 0.3).sin()).collect();
        let hess = vec![1.0; 200];
        let data = BinnedMatrix::from_rows(&rows, 255);

        let learner = TreeLearner::new(&data, params(6, 5));
        let (tree, leaves) = learner.grow(&grad, &hess, (0..200).collect(), &[0, 1]);
        assert_eq!(tree.num_leaves(), 6);
        assert_eq!(leaves.iter().map(|l| l.rows.len()).sum::<usize>(), 200);
    }

    #[test]
    fn test_metrics_and_median() {
        assert_eq!(Metric::L1.evaluate(&[1.0, 3.0], &[2.0, 2.0]), 1.0);
        assert_eq!(Metric::L2.evaluate(&[1.0, 3.0], &[3.0, 3.0]), 2.0);
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(Objective::RegressionL1.gradients(1.0, 3.0), (-1.0, 1.0));
    }

    #[test]
    fn test_booster_truncates_to_iteration() {
        let mut booster = GradientBooster::new(Objective::Regression, 1.0);
        for v in [1.0, 2.0, 4.0] {
            booster.trees.push(RegressionTree {
                nodes: vec![Node::Leaf { value: v }],
            });
        }
        assert_eq!(booster.predict_row(&[], 0), 1.0);
        assert_eq!(booster.predict_row(&[], 2), 4.0);
        assert_eq!(booster.predict_row(&[], 10), 8.0);
    }
}
