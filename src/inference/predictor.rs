use crate::error::{AppError, Result};
use crate::inference::aligner::{FeatureAligner, ShipmentFeatures};
use crate::ml::artifact::ModelArtifact;
use crate::ml::boosting::GradientBoostedClassifier;
use crate::ml::models::ModelMetadata;
use crate::models::RiskLevel;

/// One scored shipment
#[derive(Debug, Clone)]
pub struct Prediction {
    pub delay_probability: f64,
    pub delay_risk: RiskLevel,
}

/// Serving wrapper around a loaded model.
///
/// Owns the classifier and the aligner built from the persisted column
/// order. The state is immutable after load, so handlers share it behind an
/// `Arc` without locking.
#[derive(Debug)]
pub struct DelayPredictor {
    model: GradientBoostedClassifier,
    aligner: FeatureAligner,
    metadata: Option<ModelMetadata>,
}

impl DelayPredictor {
    /// Wrap a loaded artifact, checking that the model and column list agree.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        let n_model = artifact.model.n_features();
        let n_columns = artifact.columns.len();
        if n_model != n_columns {
            return Err(AppError::UnsupportedModel(format!(
                "model expects {} features but {} columns are persisted",
                n_model, n_columns
            )));
        }

        Ok(Self {
            model: artifact.model,
            aligner: FeatureAligner::new(artifact.columns),
            metadata: artifact.metadata,
        })
    }

    /// Score one shipment.
    pub fn predict(&self, features: &ShipmentFeatures) -> Result<Prediction> {
        let vector = self.aligner.align(features);
        let probability = self.model.predict_proba_one(&vector)?;
        let delay_probability = round_to(probability, 3);

        Ok(Prediction {
            delay_probability,
            delay_risk: RiskLevel::from_probability(delay_probability),
        })
    }

    /// Most influential columns, strongest first, capped at eight.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .aligner
            .columns()
            .iter()
            .cloned()
            .zip(self.model.feature_importances().iter().copied())
            .map(|(name, weight)| (name, round_to(weight, 4)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(8);
        ranked
    }

    pub fn columns(&self) -> &[String] {
        self.aligner.columns()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::boosting::BoostingConfig;
    use crate::ml::dataset::{build_frame, TrainingRow};

    fn trained_predictor() -> DelayPredictor {
        // Rainy Houston shipments delayed, calm Seattle shipments on time
        let mut rows = Vec::new();
        for i in 0..30 {
            let delayed = i % 2 == 0;
            rows.push(TrainingRow {
                weather_risk_score: if delayed { 40.0 + i as f64 } else { 3.0 },
                temp_max: 20.0,
                rainfall: if delayed { 60.0 } else { 1.0 },
                wind_speed: 10.0,
                port_congestion: if delayed { 0.9 } else { 0.1 },
                shipping_mode: "Standard Class".to_string(),
                nearest_port: if delayed {
                    "Port of Houston".to_string()
                } else {
                    "Port of Seattle".to_string()
                },
                delay_flag: u8::from(delayed),
            });
        }
        let frame = build_frame(&rows);
        let mut model = GradientBoostedClassifier::new(BoostingConfig {
            n_estimators: 15,
            max_depth: 3,
            learning_rate: 0.3,
            ..Default::default()
        });
        model.fit(&frame.x, &frame.y).unwrap();

        DelayPredictor::from_artifact(ModelArtifact {
            model,
            columns: frame.columns,
            metadata: None,
        })
        .unwrap()
    }

    fn risky_features() -> ShipmentFeatures {
        ShipmentFeatures {
            weather_risk_score: 55.0,
            temp_max: 20.0,
            rainfall: 60.0,
            wind_speed: 10.0,
            port_congestion: 0.9,
            shipping_mode: "Standard Class".to_string(),
            nearest_port: "Port of Houston".to_string(),
        }
    }

    fn calm_features() -> ShipmentFeatures {
        ShipmentFeatures {
            weather_risk_score: 3.0,
            temp_max: 20.0,
            rainfall: 1.0,
            wind_speed: 10.0,
            port_congestion: 0.1,
            shipping_mode: "Standard Class".to_string(),
            nearest_port: "Port of Seattle".to_string(),
        }
    }

    #[test]
    fn test_separates_risky_from_calm() {
        let predictor = trained_predictor();

        let risky = predictor.predict(&risky_features()).unwrap();
        let calm = predictor.predict(&calm_features()).unwrap();
        assert!(risky.delay_probability > calm.delay_probability);
        assert_eq!(risky.delay_risk, RiskLevel::High);
        assert_eq!(calm.delay_risk, RiskLevel::Low);
    }

    #[test]
    fn test_probability_rounded_to_three_decimals() {
        let predictor = trained_predictor();
        let p = predictor.predict(&risky_features()).unwrap().delay_probability;
        assert_eq!(p, round_to(p, 3));
    }

    #[test]
    fn test_unseen_port_still_scores() {
        let predictor = trained_predictor();
        let mut features = calm_features();
        features.nearest_port = "Port of Rotterdam".to_string();

        let prediction = predictor.predict(&features).unwrap();
        assert!((0.0..=1.0).contains(&prediction.delay_probability));
    }

    #[test]
    fn test_importance_capped_and_sorted() {
        let predictor = trained_predictor();
        let ranked = predictor.feature_importance();

        assert!(ranked.len() <= 8);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        for (_, weight) in &ranked {
            assert_eq!(*weight, round_to(*weight, 4));
        }
    }

    #[test]
    fn test_mismatched_artifact_rejected() {
        let predictor = trained_predictor();
        let n = predictor.columns().len();

        let mut model = GradientBoostedClassifier::new(BoostingConfig {
            n_estimators: 2,
            max_depth: 2,
            ..Default::default()
        });
        let frame = build_frame(&[TrainingRow {
            weather_risk_score: 1.0,
            temp_max: 1.0,
            rainfall: 1.0,
            wind_speed: 1.0,
            port_congestion: 1.0,
            shipping_mode: "A".to_string(),
            nearest_port: "B".to_string(),
            delay_flag: 1,
        }, TrainingRow {
            weather_risk_score: 0.0,
            temp_max: 0.0,
            rainfall: 0.0,
            wind_speed: 0.0,
            port_congestion: 0.0,
            shipping_mode: "A".to_string(),
            nearest_port: "B".to_string(),
            delay_flag: 0,
        }]);
        model.fit(&frame.x, &frame.y).unwrap();

        // Column list longer than what the model was trained on
        let mut columns = frame.columns;
        for i in columns.len()..n + 1 {
            columns.push(format!("extra_{}", i));
        }
        let err = DelayPredictor::from_artifact(ModelArtifact {
            model,
            columns,
            metadata: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedModel(_)));
    }
}
