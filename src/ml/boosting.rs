use crate::error::{AppError, Result};
use crate::ml::tree::RegressionTree;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Hyperparameters for the boosted ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's contribution
    pub learning_rate: f64,
    /// Maximum depth per tree
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio per tree
    pub subsample: f64,
    /// Column subsample ratio per tree
    pub colsample_bytree: f64,
    /// Gradient weight applied to positive-class samples
    pub scale_pos_weight: f64,
    /// Seed for the row/column samplers
    pub random_state: Option<u64>,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.08,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            scale_pos_weight: 1.0,
            random_state: Some(42),
        }
    }
}

/// Binary gradient-boosted classifier over log odds.
///
/// Each round fits a regression tree to the log-loss pseudo-residuals and
/// adds its shrunken output to the running log odds. Class imbalance is
/// handled by scaling the positive-class residuals with `scale_pos_weight`,
/// which pushes the ensemble toward recall on the rare class the same way
/// the equivalent knob does in the common boosting libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: BoostingConfig,
    trees: Vec<RegressionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
}

impl GradientBoostedClassifier {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_importances.len()
    }

    /// Fit on a feature matrix and 0/1 labels.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AppError::Training(format!(
                "feature matrix has {} rows but labels have {}",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 || n_features == 0 {
            return Err(AppError::Training(
                "cannot fit on an empty training matrix".to_string(),
            ));
        }

        // Prior log odds of the positive class
        let p = y.mean().unwrap_or(0.5);
        self.initial_log_odds = (p / (1.0 - p + 1e-10)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees = Vec::with_capacity(self.config.n_estimators);
        self.col_indices_per_tree = Vec::with_capacity(self.config.n_estimators);
        self.feature_importances = vec![0.0; n_features];

        let spw = self.config.scale_pos_weight;

        for _ in 0..self.config.n_estimators {
            // Weighted gradient of the log loss
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| {
                    let pi = sigmoid(lo);
                    let weight = if yi > 0.5 { spw } else { 1.0 };
                    (yi - pi) * weight
                })
                .collect();

            let row_indices = sample_indices(n_samples, self.config.subsample, &mut rng);
            let col_indices = sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_rows = x.select(ndarray::Axis(0), &row_indices);
            let x_sub = x_rows.select(ndarray::Axis(1), &col_indices);
            let y_sub: Array1<f64> =
                Array1::from_vec(row_indices.iter().map(|&i| residuals[i]).collect());

            let mut tree = RegressionTree::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            let tree_pred = tree.predict(&x_sub)?;
            for (i, &idx) in row_indices.iter().enumerate() {
                log_odds[idx] += self.config.learning_rate * tree_pred[i];
            }

            for (j, &col_idx) in col_indices.iter().enumerate() {
                self.feature_importances[col_idx] += tree.feature_importances()[j];
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        Ok(())
    }

    /// Positive-class probability for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n = x.nrows();
        let mut log_odds = Array1::from_elem(n, self.initial_log_odds);

        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(ndarray::Axis(1), col_indices);
            let tree_pred = tree.predict(&x_sub)?;
            for i in 0..n {
                log_odds[i] += self.config.learning_rate * tree_pred[i];
            }
        }

        Ok(log_odds.iter().map(|&lo| sigmoid(lo)).collect())
    }

    /// Single-row probability without per-tree matrix allocations.
    pub fn predict_proba_one(&self, row: &[f64]) -> Result<f64> {
        let mut log_odds = self.initial_log_odds;
        let mut projected = Vec::with_capacity(row.len());

        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            projected.clear();
            projected.extend(col_indices.iter().map(|&c| row[c]));
            log_odds += self.config.learning_rate * tree.predict_row(&projected)?;
        }

        Ok(sigmoid(log_odds))
    }

    /// Hard labels at the conventional 0.5 cut
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .iter()
            .map(|&p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    /// Normalized importance per input column, summing to one
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let sample_size = ((n as f64) * ratio).ceil().max(1.0) as usize;
    indices.shuffle(rng);
    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}
