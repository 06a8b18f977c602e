use crate::ml::dataset::{indicator_name, NEAREST_PORT_PREFIX, SHIPPING_MODE_PREFIX};
use std::collections::HashMap;

/// Raw feature values for one shipment, as supplied by a caller
#[derive(Debug, Clone)]
pub struct ShipmentFeatures {
    pub weather_risk_score: f64,
    pub temp_max: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub port_congestion: f64,
    pub shipping_mode: String,
    pub nearest_port: String,
}

/// Projects sparse shipment features onto the trained column order.
///
/// The persisted column list is the single source of truth: every value is
/// placed by exact name lookup, a categorical value the model never saw
/// leaves its indicator block all zero, and nothing is ever appended or
/// reordered. The output vector length always equals the training width.
#[derive(Debug, Clone)]
pub struct FeatureAligner {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureAligner {
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { columns, index }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Build the dense vector for one shipment.
    pub fn align(&self, features: &ShipmentFeatures) -> Vec<f64> {
        let mut vector = vec![0.0; self.columns.len()];

        let numeric = [
            ("weather_risk_score", features.weather_risk_score),
            ("temp_max", features.temp_max),
            ("rainfall", features.rainfall),
            ("wind_speed", features.wind_speed),
            ("port_congestion", features.port_congestion),
        ];
        for (name, value) in numeric {
            if let Some(&i) = self.index.get(name) {
                vector[i] = value;
            }
        }

        let mode_column = indicator_name(SHIPPING_MODE_PREFIX, &features.shipping_mode);
        if let Some(&i) = self.index.get(&mode_column) {
            vector[i] = 1.0;
        }
        let port_column = indicator_name(NEAREST_PORT_PREFIX, &features.nearest_port);
        if let Some(&i) = self.index.get(&port_column) {
            vector[i] = 1.0;
        }

        vector
    }
}
