use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binary classification metrics at a fixed decision threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Score predicted probabilities against 0/1 labels at `threshold`.
pub fn evaluate_probabilities(
    probabilities: &Array1<f64>,
    labels: &Array1<f64>,
    threshold: f64,
) -> ModelMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;

    for (&p, &y) in probabilities.iter().zip(labels.iter()) {
        let predicted_positive = p >= threshold;
        let actual_positive = y > 0.5;
        match (predicted_positive, actual_positive) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = tp + fp + tn + fn_;
    let accuracy = if total > 0 {
        (tp + tn) as f64 / total as f64
    } else {
        0.0
    };
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ModelMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
    }
}

/// Provenance record persisted alongside the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model family identifier
    pub model_type: String,

    /// Crate version that produced the artifact
    pub version: String,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of held-out samples
    pub n_test_samples: usize,

    /// Number of encoded feature columns
    pub n_features: usize,

    /// Gradient weight applied to the positive class
    pub scale_pos_weight: f64,

    /// Threshold used for the held-out evaluation
    pub decision_threshold: f64,

    /// SHA-256 of the training input file
    pub dataset_fingerprint: String,

    /// Hyperparameters as recorded at training time
    pub hyperparameters: HashMap<String, String>,

    /// Held-out metrics
    pub validation_metrics: ModelMetrics,
}
