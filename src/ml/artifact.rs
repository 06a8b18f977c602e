use crate::error::{AppError, Result};
use crate::ml::boosting::GradientBoostedClassifier;
use crate::ml::models::ModelMetadata;
use std::path::Path;
use tracing::{info, warn};

/// Serialized classifier
pub const MODEL_FILE: &str = "delay_model.bin";

/// Feature column names in training order, the serving contract
pub const COLUMNS_FILE: &str = "feature_columns.json";

/// Training provenance
pub const METADATA_FILE: &str = "metadata.json";

/// A trained model together with everything serving needs
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub model: GradientBoostedClassifier,
    pub columns: Vec<String>,
    pub metadata: Option<ModelMetadata>,
}

/// Persist a trained model, its column order and its metadata.
pub fn save_artifact(
    dir: &Path,
    model: &GradientBoostedClassifier,
    columns: &[String],
    metadata: &ModelMetadata,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let model_bytes = bincode::serialize(model)?;
    std::fs::write(dir.join(MODEL_FILE), model_bytes)?;
    std::fs::write(dir.join(COLUMNS_FILE), serde_json::to_vec_pretty(&columns)?)?;
    std::fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(metadata)?)?;

    info!(dir = %dir.display(), n_columns = columns.len(), "Saved model artifact");
    Ok(())
}

/// Load a persisted model artifact.
///
/// The model and column files are both required. Metadata is informational,
/// so an artifact written by hand or by an older build still loads without
/// it.
pub fn load_artifact(dir: &Path) -> Result<ModelArtifact> {
    let model_path = dir.join(MODEL_FILE);
    let columns_path = dir.join(COLUMNS_FILE);

    if !model_path.exists() {
        return Err(AppError::ModelUnavailable(format!(
            "missing model file {}",
            model_path.display()
        )));
    }
    if !columns_path.exists() {
        return Err(AppError::ModelUnavailable(format!(
            "missing feature columns file {}",
            columns_path.display()
        )));
    }

    let model_bytes = std::fs::read(&model_path)?;
    let model: GradientBoostedClassifier = bincode::deserialize(&model_bytes)
        .map_err(|e| AppError::ModelUnavailable(format!("corrupt model file: {}", e)))?;

    let columns_bytes = std::fs::read(&columns_path)?;
    let columns: Vec<String> = serde_json::from_slice(&columns_bytes)
        .map_err(|e| AppError::ModelUnavailable(format!("corrupt feature columns: {}", e)))?;

    if columns.is_empty() {
        return Err(AppError::ModelUnavailable(
            "feature columns file is empty".to_string(),
        ));
    }

    let metadata_path = dir.join(METADATA_FILE);
    let metadata = if metadata_path.exists() {
        match serde_json::from_slice(&std::fs::read(&metadata_path)?) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(error = %e, "Metadata file is unreadable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    info!(
        dir = %dir.display(),
        n_columns = columns.len(),
        n_trees = model.n_trees(),
        "Loaded model artifact"
    );

    Ok(ModelArtifact {
        model,
        columns,
        metadata,
    })
}
