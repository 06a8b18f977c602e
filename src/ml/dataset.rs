use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Numeric feature columns, in serving order
pub const NUMERIC_FEATURES: [&str; 5] = [
    "weather_risk_score",
    "temp_max",
    "rainfall",
    "wind_speed",
    "port_congestion",
];

/// Prefix for shipping-mode indicator columns
pub const SHIPPING_MODE_PREFIX: &str = "shipping_mode";

/// Prefix for nearest-port indicator columns
pub const NEAREST_PORT_PREFIX: &str = "nearest_port";

/// One observation ready for encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRow {
    pub weather_risk_score: f64,
    pub temp_max: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub port_congestion: f64,
    pub shipping_mode: String,
    pub nearest_port: String,
    pub delay_flag: u8,
}

/// Encoded design matrix with its column names and labels.
///
/// The column list is the serving contract: inference rebuilds vectors in
/// exactly this order, so anything that changes how columns are named or
/// ordered here is a breaking change for persisted models.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub columns: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

impl FeatureFrame {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Count of positive labels
    pub fn n_positive(&self) -> usize {
        self.y.iter().filter(|&&v| v > 0.5).count()
    }
}

/// Lowercase a categorical value and collapse separators to underscores,
/// so "First Class" and "Port of Houston" become stable column suffixes.
pub fn snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_was_sep = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Indicator column name for a categorical value
pub fn indicator_name(prefix: &str, value: &str) -> String {
    format!("{}_{}", prefix, snake_case(value))
}

/// One-hot encode the categorical columns and assemble the design matrix.
///
/// Distinct values are sorted and the first is dropped as the baseline, so
/// a row of all-zero indicators within a block means "the baseline value".
/// Numeric columns come first, then shipping-mode indicators, then
/// nearest-port indicators.
pub fn build_frame(rows: &[TrainingRow]) -> FeatureFrame {
    let modes: BTreeSet<&str> = rows.iter().map(|r| r.shipping_mode.as_str()).collect();
    let ports: BTreeSet<&str> = rows.iter().map(|r| r.nearest_port.as_str()).collect();

    // drop_first: the sorted-first value becomes the baseline
    let mode_levels: Vec<&str> = modes.into_iter().skip(1).collect();
    let port_levels: Vec<&str> = ports.into_iter().skip(1).collect();

    let mut columns: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
    columns.extend(
        mode_levels
            .iter()
            .map(|v| indicator_name(SHIPPING_MODE_PREFIX, v)),
    );
    columns.extend(
        port_levels
            .iter()
            .map(|v| indicator_name(NEAREST_PORT_PREFIX, v)),
    );

    let n_features = columns.len();
    let mut x = Array2::zeros((rows.len(), n_features));
    let mut y = Array1::zeros(rows.len());

    for (i, row) in rows.iter().enumerate() {
        x[[i, 0]] = row.weather_risk_score;
        x[[i, 1]] = row.temp_max;
        x[[i, 2]] = row.rainfall;
        x[[i, 3]] = row.wind_speed;
        x[[i, 4]] = row.port_congestion;

        let mode_offset = NUMERIC_FEATURES.len();
        for (j, level) in mode_levels.iter().enumerate() {
            if row.shipping_mode == *level {
                x[[i, mode_offset + j]] = 1.0;
            }
        }
        let port_offset = mode_offset + mode_levels.len();
        for (j, level) in port_levels.iter().enumerate() {
            if row.nearest_port == *level {
                x[[i, port_offset + j]] = 1.0;
            }
        }

        y[i] = f64::from(row.delay_flag);
    }

    FeatureFrame { columns, x, y }
}

/// Split the frame into train/test halves, stratified on the label.
///
/// Each class is shuffled independently with the seeded generator and its
/// tail taken for the test set, which keeps the class ratio close to the
/// full dataset on both sides. Row order within each side follows the
/// original frame.
pub fn stratified_split(
    frame: &FeatureFrame,
    test_size: f64,
    seed: u64,
) -> (FeatureFrame, FeatureFrame) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut train_indices: Vec<usize> = Vec::new();
    let mut test_indices: Vec<usize> = Vec::new();

    for class in [0.0, 1.0] {
        let mut class_indices: Vec<usize> = (0..frame.n_samples())
            .filter(|&i| (frame.y[i] - class).abs() < 0.5)
            .collect();
        let n_class = class_indices.len();
        if n_class == 0 {
            continue;
        }

        class_indices.shuffle(&mut rng);
        let mut n_test = (n_class as f64 * test_size).round() as usize;
        // Keep at least one sample on each side when the class allows it
        if n_test == n_class && n_class > 1 {
            n_test = n_class - 1;
        }

        let split_at = n_class - n_test;
        train_indices.extend_from_slice(&class_indices[..split_at]);
        test_indices.extend_from_slice(&class_indices[split_at..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    (
        select_rows(frame, &train_indices),
        select_rows(frame, &test_indices),
    )
}

fn select_rows(frame: &FeatureFrame, indices: &[usize]) -> FeatureFrame {
    FeatureFrame {
        columns: frame.columns.clone(),
        x: frame.x.select(ndarray::Axis(0), indices),
        y: Array1::from_vec(indices.iter().map(|&i| frame.y[i]).collect()),
    }
}
