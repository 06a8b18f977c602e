use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::inference::ShipmentFeatures;
use crate::metrics::{PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS};
use crate::models::RiskLevel;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let model_loaded = state.model_loaded();
    Ok(Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
        service: "chainguard".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub model_loaded: bool,
}

/// Score one shipment
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    request.validate()?;

    let predictor = state.predictor()?;
    let timer = PREDICTION_DURATION_SECONDS.start_timer();

    let features = ShipmentFeatures {
        weather_risk_score: request.weather_risk_score,
        temp_max: request.temp_max,
        rainfall: request.rainfall,
        wind_speed: request.wind_speed,
        port_congestion: request.port_congestion,
        shipping_mode: request.shipping_mode,
        nearest_port: request.nearest_port,
    };
    let prediction = predictor.predict(&features)?;
    timer.observe_duration();

    PREDICTIONS_TOTAL
        .with_label_values(&[prediction.delay_risk.to_string().to_lowercase().as_str()])
        .inc();

    let feature_importance = {
        let ranked = predictor.feature_importance();
        if ranked.is_empty() {
            None
        } else {
            Some(FeatureImportanceResponse::from_ranked(ranked))
        }
    };

    Ok(Json(PredictResponse {
        delay_probability: prediction.delay_probability,
        delay_risk: prediction.delay_risk,
        feature_importance,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(range(min = 0.0))]
    pub weather_risk_score: f64,
    pub temp_max: f64,
    #[validate(range(min = 0.0))]
    pub rainfall: f64,
    #[validate(range(min = 0.0))]
    pub wind_speed: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub port_congestion: f64,
    #[validate(length(min = 1))]
    pub shipping_mode: String,
    #[validate(length(min = 1))]
    pub nearest_port: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub delay_probability: f64,
    pub delay_risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<FeatureImportanceResponse>,
}

/// Ranked feature importances
pub async fn feature_importance(
    State(state): State<AppState>,
) -> Result<Json<FeatureImportanceResponse>> {
    let predictor = state.predictor()?;
    let ranked = predictor.feature_importance();
    if ranked.is_empty() {
        return Err(AppError::UnsupportedModel(
            "loaded model exposes no feature importances".to_string(),
        ));
    }
    Ok(Json(FeatureImportanceResponse::from_ranked(ranked)))
}

/// Parallel arrays, strongest feature first
#[derive(Debug, Serialize)]
pub struct FeatureImportanceResponse {
    pub features: Vec<String>,
    pub importance: Vec<f64>,
}

impl FeatureImportanceResponse {
    fn from_ranked(ranked: Vec<(String, f64)>) -> Self {
        let (features, importance) = ranked.into_iter().unzip();
        Self {
            features,
            importance,
        }
    }
}

/// Interactive what-if form, compiled into the binary
pub async fn dashboard() -> Html<&'static str> {
    Html(include_str!("../../assets/dashboard.html"))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
