//! Integration tests for training: enriched shipments in, persisted artifact
//! out, and the alignment contract between the training-time encoding and
//! the serving-side feature vector.

use chainguard::config::TrainingConfig;
use chainguard::inference::{DelayPredictor, FeatureAligner, ShipmentFeatures};
use chainguard::ml::{
    build_frame, load_artifact, train_model, TrainingRow, COLUMNS_FILE, METADATA_FILE, MODEL_FILE,
};
use chainguard::models::EnrichedShipment;
use chrono::NaiveDate;
use std::path::PathBuf;

fn enriched(port: &str, mode: &str, delay_days: i64, rainfall: f64) -> EnrichedShipment {
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
        rainfall: Some(rainfall),
        wind_speed: Some(10.0),
        weather_risk_score: Some(rainfall * 0.5 + 10.0 * 0.3 + 20.0 * 0.2),
    }
}

/// Forty shipments, evenly split: stormy Houston rows always late, calm
/// Seattle rows always on time.
fn synthetic_dataset() -> Vec<EnrichedShipment> {
    (0..40)
        .map(|i| {
            let delayed = i % 2 == 0;
            let mode = if i % 3 == 0 { "First Class" } else { "Standard Class" };
            if delayed {
                enriched("Port of Houston", mode, 3, 60.0 + i as f64)
            } else {
                enriched("Port of Seattle", mode, -1, 1.0 + i as f64 * 0.1)
            }
        })
        .collect()
}

fn write_dataset(dir: &tempfile::TempDir, rows: &[EnrichedShipment]) -> PathBuf {
    let path = dir.path().join("with_weather.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    for row in rows {
        writer.serialize(row).unwrap();
    }
    writer.flush().unwrap();
    path
}

fn test_config() -> TrainingConfig {
    TrainingConfig {
        n_estimators: 20,
        max_depth: 3,
        learning_rate: 0.3,
        ..Default::default()
    }
}

fn houston_features() -> ShipmentFeatures {
    ShipmentFeatures {
        weather_risk_score: 40.0,
        temp_max: 20.0,
        rainfall: 65.0,
        wind_speed: 10.0,
        port_congestion: 1.0,
        shipping_mode: "Standard Class".to_string(),
        nearest_port: "Port of Houston".to_string(),
    }
}

fn seattle_features() -> ShipmentFeatures {
    ShipmentFeatures {
        weather_risk_score: 8.0,
        temp_max: 20.0,
        rainfall: 2.0,
        wind_speed: 10.0,
        port_congestion: 0.0,
        shipping_mode: "Standard Class".to_string(),
        nearest_port: "Port of Seattle".to_string(),
    }
}

#[test]
fn test_train_persist_load_score() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dataset(&dir, &synthetic_dataset());
    let models_dir = dir.path().join("models");

    let outcome = train_model(&input, &models_dir, &test_config()).unwrap();
    assert_eq!(outcome.rows_usable, 40);
    assert!(outcome.metrics.accuracy > 0.8);

    // The artifact on disk serves without any handle to the training run
    let predictor = DelayPredictor::from_artifact(load_artifact(&models_dir).unwrap()).unwrap();

    let risky = predictor.predict(&houston_features()).unwrap();
    let calm = predictor.predict(&seattle_features()).unwrap();
    assert!(risky.delay_probability > 0.65);
    assert!(calm.delay_probability < 0.4);
}

#[test]
fn test_column_file_matches_model_width() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dataset(&dir, &synthetic_dataset());
    let models_dir = dir.path().join("models");

    let outcome = train_model(&input, &models_dir, &test_config()).unwrap();

    assert!(models_dir.join(MODEL_FILE).exists());
    assert!(models_dir.join(COLUMNS_FILE).exists());
    assert!(models_dir.join(METADATA_FILE).exists());

    let artifact = load_artifact(&models_dir).unwrap();
    assert_eq!(artifact.columns.len(), outcome.n_features);
    assert_eq!(artifact.model.n_features(), artifact.columns.len());

    // Numeric columns come first, then indicators with the sorted-first
    // category of each group dropped as the baseline
    assert_eq!(artifact.columns[0], "weather_risk_score");
    assert!(artifact.columns.contains(&"shipping_mode_standard_class".to_string()));
    assert!(artifact.columns.contains(&"nearest_port_port_of_seattle".to_string()));
    assert!(!artifact.columns.contains(&"shipping_mode_first_class".to_string()));
    assert!(!artifact.columns.contains(&"nearest_port_port_of_houston".to_string()));
}

#[test]
fn test_unseen_category_encodes_as_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dataset(&dir, &synthetic_dataset());
    let models_dir = dir.path().join("models");
    train_model(&input, &models_dir, &test_config()).unwrap();

    let predictor = DelayPredictor::from_artifact(load_artifact(&models_dir).unwrap()).unwrap();

    // An unseen port contributes an all-zero indicator block, which is the
    // same encoding the dropped baseline port gets; identical numerics must
    // therefore give the identical probability
    let baseline = predictor.predict(&houston_features()).unwrap();
    let mut unseen = houston_features();
    unseen.nearest_port = "Port of Tacoma".to_string();
    let scored = predictor.predict(&unseen).unwrap();

    assert_eq!(scored.delay_probability, baseline.delay_probability);
    assert_eq!(scored.delay_risk, baseline.delay_risk);
}

#[test]
fn test_metadata_records_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dataset(&dir, &synthetic_dataset());
    let models_dir = dir.path().join("models");

    let outcome = train_model(&input, &models_dir, &test_config()).unwrap();
    let metadata = load_artifact(&models_dir).unwrap().metadata.unwrap();

    assert_eq!(metadata.model_type, "gradient_boosting");
    assert_eq!(metadata.n_training_samples, outcome.n_train);
    assert_eq!(metadata.n_test_samples, outcome.n_test);
    assert_eq!(metadata.dataset_fingerprint.len(), 64);
    assert!(metadata
        .dataset_fingerprint
        .chars()
        .all(|c| c.is_ascii_hexdigit()));
    assert_eq!(metadata.hyperparameters["n_estimators"], "20");
    assert_eq!(metadata.decision_threshold, 0.4);
    assert_eq!(metadata.validation_metrics.accuracy, outcome.metrics.accuracy);
}

#[test]
fn test_same_input_same_model() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dataset(&dir, &synthetic_dataset());

    let dir_a = dir.path().join("models_a");
    let dir_b = dir.path().join("models_b");
    train_model(&input, &dir_a, &test_config()).unwrap();
    train_model(&input, &dir_b, &test_config()).unwrap();

    let a = DelayPredictor::from_artifact(load_artifact(&dir_a).unwrap()).unwrap();
    let b = DelayPredictor::from_artifact(load_artifact(&dir_b).unwrap()).unwrap();

    for features in [houston_features(), seattle_features()] {
        let pa = a.predict(&features).unwrap();
        let pb = b.predict(&features).unwrap();
        assert_eq!(pa.delay_probability, pb.delay_probability);
    }
}

#[test]
fn test_alignment_reproduces_training_encoding() {
    // A row's sparse form pushed through the serving aligner must land on
    // exactly the dense vector the training encoder produced for it
    let rows: Vec<TrainingRow> = [
        (12.5, "First Class", "Port of Houston"),
        (3.0, "Second Class", "Port of Seattle"),
        (47.0, "Standard Class", "Port of Houston"),
        (8.25, "Second Class", "Port of Savannah"),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(risk, mode, port))| TrainingRow {
        weather_risk_score: risk,
        temp_max: 15.0 + i as f64,
        rainfall: risk / 2.0,
        wind_speed: 9.0 + i as f64,
        port_congestion: 0.1 * i as f64,
        shipping_mode: mode.to_string(),
        nearest_port: port.to_string(),
        delay_flag: u8::from(i % 2 == 0),
    })
    .collect();

    let frame = build_frame(&rows);
    let aligner = FeatureAligner::new(frame.columns.clone());

    for (i, row) in rows.iter().enumerate() {
        let aligned = aligner.align(&ShipmentFeatures {
            weather_risk_score: row.weather_risk_score,
            temp_max: row.temp_max,
            rainfall: row.rainfall,
            wind_speed: row.wind_speed,
            port_congestion: row.port_congestion,
            shipping_mode: row.shipping_mode.clone(),
            nearest_port: row.nearest_port.clone(),
        });
        assert_eq!(aligned, frame.x.row(i).to_vec(), "row {} diverged", i);
    }
}

#[test]
fn test_training_rejects_fully_unusable_input() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<EnrichedShipment> = synthetic_dataset()
        .into_iter()
        .map(|mut r| {
            r.temp_max = None;
            r.rainfall = None;
            r.wind_speed = None;
            r.weather_risk_score = None;
            r
        })
        .collect();
    let input = write_dataset(&dir, &rows);

    let err = train_model(&input, &dir.path().join("models"), &test_config()).unwrap_err();
    assert!(err.to_string().contains("no usable rows"));
}
