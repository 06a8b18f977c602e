use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::artifact::save_artifact;
use crate::ml::boosting::{BoostingConfig, GradientBoostedClassifier};
use crate::ml::dataset::{build_frame, stratified_split, TrainingRow};
use crate::ml::models::{evaluate_probabilities, ModelMetadata, ModelMetrics};
use crate::models::EnrichedShipment;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// What came out of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub rows_total: usize,
    pub rows_usable: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub scale_pos_weight: f64,
    pub metrics: ModelMetrics,
    pub columns: Vec<String>,
    pub top_features: Vec<(String, f64)>,
}

/// Train the delay classifier from the enriched shipment table.
///
/// Rows missing weather or with an unresolved port are excluded, the label
/// is derived from `delay_days`, and per-port congestion is the historical
/// delay rate of that port across the usable rows. The fitted model, the
/// encoded column order and a provenance record are persisted to
/// `models_dir`.
pub fn train_model(
    input_path: &Path,
    models_dir: &Path,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    info!(path = %input_path.display(), "Loading enriched shipments");

    let input_bytes = std::fs::read(input_path)?;
    let dataset_fingerprint = hex_digest(&input_bytes);

    let mut reader = csv::Reader::from_reader(input_bytes.as_slice());
    let shipments: Vec<EnrichedShipment> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;
    let rows_total = shipments.len();

    let usable: Vec<&EnrichedShipment> = shipments.iter().filter(|s| s.is_complete()).collect();
    let rows_usable = usable.len();
    if rows_usable < rows_total {
        warn!(
            dropped = rows_total - rows_usable,
            "Excluding rows without weather or with an unresolved port"
        );
    }
    if rows_usable == 0 {
        return Err(AppError::Training(
            "no usable rows: every shipment is missing weather or a port".to_string(),
        ));
    }

    // Per-port delay rate over the usable rows
    let mut port_stats: HashMap<&str, (f64, usize)> = HashMap::new();
    for s in &usable {
        let entry = port_stats.entry(s.nearest_port.as_str()).or_insert((0.0, 0));
        entry.0 += f64::from(s.delay_flag());
        entry.1 += 1;
    }
    let congestion: HashMap<&str, f64> = port_stats
        .into_iter()
        .map(|(port, (delayed, count))| (port, delayed / count as f64))
        .collect();

    let rows: Vec<TrainingRow> = usable
        .iter()
        .map(|s| TrainingRow {
            weather_risk_score: s.weather_risk_score.unwrap_or_default(),
            temp_max: s.temp_max.unwrap_or_default(),
            rainfall: s.rainfall.unwrap_or_default(),
            wind_speed: s.wind_speed.unwrap_or_default(),
            port_congestion: congestion[s.nearest_port.as_str()],
            shipping_mode: s.shipping_mode.clone(),
            nearest_port: s.nearest_port.clone(),
            delay_flag: s.delay_flag(),
        })
        .collect();

    let frame = build_frame(&rows);
    let n_positive = frame.n_positive();
    if n_positive == 0 || n_positive == frame.n_samples() {
        return Err(AppError::Training(format!(
            "training data needs both classes, got {} delayed of {} rows",
            n_positive,
            frame.n_samples()
        )));
    }

    let (train, test) = stratified_split(&frame, config.test_size, config.seed);

    // Class balance from the training side only
    let train_pos = train.n_positive();
    let train_neg = train.n_samples() - train_pos;
    if train_pos == 0 || train_neg == 0 {
        return Err(AppError::Training(
            "training split lost one of the classes, need more data".to_string(),
        ));
    }
    let scale_pos_weight = train_neg as f64 / train_pos as f64;

    info!(
        n_train = train.n_samples(),
        n_test = test.n_samples(),
        n_features = frame.n_features(),
        scale_pos_weight = format!("{:.3}", scale_pos_weight).as_str(),
        "Fitting gradient-boosted classifier"
    );

    let boosting_config = BoostingConfig {
        n_estimators: config.n_estimators,
        learning_rate: config.learning_rate,
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
        subsample: config.subsample,
        colsample_bytree: config.colsample_bytree,
        scale_pos_weight,
        random_state: Some(config.seed),
    };
    let mut model = GradientBoostedClassifier::new(boosting_config);
    model.fit(&train.x, &train.y)?;

    let metrics = if test.n_samples() > 0 {
        let probs = model.predict_proba(&test.x)?;
        evaluate_probabilities(&probs, &test.y, config.decision_threshold)
    } else {
        warn!("Test split is empty, skipping held-out evaluation");
        ModelMetrics::new()
    };
    info!(
        accuracy = format!("{:.4}", metrics.accuracy).as_str(),
        precision = format!("{:.4}", metrics.precision).as_str(),
        recall = format!("{:.4}", metrics.recall).as_str(),
        f1 = format!("{:.4}", metrics.f1_score).as_str(),
        threshold = config.decision_threshold,
        tp = metrics.true_positives,
        fp = metrics.false_positives,
        tn = metrics.true_negatives,
        fn_ = metrics.false_negatives,
        "Held-out evaluation"
    );

    let hyperparameters = HashMap::from([
        ("n_estimators".to_string(), config.n_estimators.to_string()),
        ("learning_rate".to_string(), config.learning_rate.to_string()),
        ("max_depth".to_string(), config.max_depth.to_string()),
        ("subsample".to_string(), config.subsample.to_string()),
        (
            "colsample_bytree".to_string(),
            config.colsample_bytree.to_string(),
        ),
        (
            "min_samples_leaf".to_string(),
            config.min_samples_leaf.to_string(),
        ),
        ("seed".to_string(), config.seed.to_string()),
    ]);
    let metadata = ModelMetadata {
        model_type: "gradient_boosting".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        trained_at: chrono::Utc::now(),
        n_training_samples: train.n_samples(),
        n_test_samples: test.n_samples(),
        n_features: frame.n_features(),
        scale_pos_weight,
        decision_threshold: config.decision_threshold,
        dataset_fingerprint,
        hyperparameters,
        validation_metrics: metrics.clone(),
    };

    save_artifact(models_dir, &model, &frame.columns, &metadata)?;

    let mut top_features: Vec<(String, f64)> = frame
        .columns
        .iter()
        .cloned()
        .zip(model.feature_importances().iter().copied())
        .collect();
    top_features.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    top_features.truncate(8);

    Ok(TrainingOutcome {
        rows_total,
        rows_usable,
        n_train: train.n_samples(),
        n_test: test.n_samples(),
        n_features: frame.n_features(),
        scale_pos_weight,
        metrics,
        columns: frame.columns,
        top_features,
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::artifact::{load_artifact, COLUMNS_FILE, METADATA_FILE, MODEL_FILE};
    use chrono::NaiveDate;

    fn enriched(port: &str, mode: &str, delay_days: i64, risk: f64) -> EnrichedShipment {
        let order_date = NaiveDate::from_ymd_opt(2018, 1, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        EnrichedShipment {
            order_date,
            order_city: "Houston".to_string(),
            order_country: "United States".to_string(),
            shipping_mode: mode.to_string(),
            delay_days,
            order_week: "2018-01-29/2018-02-04".to_string(),
            nearest_port: port.to_string(),
            temp_max: Some(20.0),
            rainfall: Some(risk),
            wind_speed: Some(10.0),
            weather_risk_score: Some(risk * 0.5 + 10.0 * 0.3 + 20.0 * 0.2),
        }
    }

    fn write_enriched(dir: &tempfile::TempDir, rows: &[EnrichedShipment]) -> std::path::PathBuf {
        let path = dir.path().join("with_weather.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        for row in rows {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();
        path
    }

    fn synthetic_rows() -> Vec<EnrichedShipment> {
        // High rainfall and Houston delays, Seattle on time
        let mut rows = Vec::new();
        for i in 0..40 {
            let delayed = i % 2 == 0;
            let (port, delay_days, risk) = if delayed {
                ("Port of Houston", 3, 60.0 + i as f64)
            } else {
                ("Port of Seattle", -1, 2.0 + i as f64 * 0.1)
            };
            let mode = if i % 3 == 0 { "First Class" } else { "Standard Class" };
            rows.push(enriched(port, mode, delay_days, risk));
        }
        rows
    }

    #[test]
    fn test_train_writes_artifact_and_scores() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_enriched(&dir, &synthetic_rows());
        let models_dir = dir.path().join("models");

        let config = TrainingConfig {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.3,
            ..Default::default()
        };
        let outcome = train_model(&input, &models_dir, &config).unwrap();

        assert_eq!(outcome.rows_total, 40);
        assert_eq!(outcome.rows_usable, 40);
        assert_eq!(outcome.n_train + outcome.n_test, 40);
        assert!(outcome.scale_pos_weight > 0.0);
        // Cleanly separable data scores well even on the small split
        assert!(outcome.metrics.accuracy > 0.8);

        assert!(models_dir.join(MODEL_FILE).exists());
        assert!(models_dir.join(COLUMNS_FILE).exists());
        assert!(models_dir.join(METADATA_FILE).exists());

        let artifact = load_artifact(&models_dir).unwrap();
        assert_eq!(artifact.columns, outcome.columns);
        let meta = artifact.metadata.unwrap();
        assert_eq!(meta.n_training_samples, outcome.n_train);
        assert_eq!(meta.dataset_fingerprint.len(), 64);
    }

    #[test]
    fn test_incomplete_rows_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let mut rows = synthetic_rows();
        rows[0].temp_max = None;
        rows[0].weather_risk_score = None;
        rows[1].nearest_port = crate::models::UNKNOWN_PORT.to_string();
        let input = write_enriched(&dir, &rows);

        let config = TrainingConfig {
            n_estimators: 5,
            max_depth: 2,
            ..Default::default()
        };
        let outcome = train_model(&input, &dir.path().join("models"), &config).unwrap();
        assert_eq!(outcome.rows_total, 40);
        assert_eq!(outcome.rows_usable, 38);
    }

    #[test]
    fn test_single_class_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<EnrichedShipment> = (0..10)
            .map(|_| enriched("Port of Houston", "First Class", 3, 50.0))
            .collect();
        let input = write_enriched(&dir, &rows);

        let err = train_model(&input, &dir.path().join("models"), &TrainingConfig::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
        assert!(err.to_string().contains("both classes"));
    }

    #[test]
    fn test_congestion_reflects_port_history() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_enriched(&dir, &synthetic_rows());
        let models_dir = dir.path().join("models");

        let config = TrainingConfig {
            n_estimators: 10,
            max_depth: 2,
            learning_rate: 0.3,
            ..Default::default()
        };
        let outcome = train_model(&input, &models_dir, &config).unwrap();

        // Every Houston row is delayed and every Seattle row is on time, so
        // port_congestion separates the classes on its own
        assert!(outcome.columns.contains(&"port_congestion".to_string()));
        assert!(outcome.metrics.recall > 0.8);
    }
}
