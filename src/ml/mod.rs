/// Model training internals for delay classification
///
/// The pipeline here goes enriched shipments -> encoded feature frame ->
/// gradient-boosted classifier -> persisted artifact. The tree and boosting
/// code is self-contained so a model trained on one machine loads bit-for-bit
/// on another with no native library in between.
pub mod artifact;
pub mod boosting;
pub mod dataset;
pub mod models;
pub mod trainer;
pub mod tree;

pub use artifact::{load_artifact, save_artifact, ModelArtifact, COLUMNS_FILE, METADATA_FILE, MODEL_FILE};
pub use boosting::{BoostingConfig, GradientBoostedClassifier};
pub use dataset::{
    build_frame, indicator_name, snake_case, stratified_split, FeatureFrame, TrainingRow,
    NEAREST_PORT_PREFIX, NUMERIC_FEATURES, SHIPPING_MODE_PREFIX,
};
pub use models::{evaluate_probabilities, ModelMetadata, ModelMetrics};
pub use trainer::{train_model, TrainingOutcome};
pub use tree::RegressionTree;
