/// Serving-side feature alignment and prediction
pub mod aligner;
pub mod predictor;

pub use aligner::{FeatureAligner, ShipmentFeatures};
pub use predictor::{DelayPredictor, Prediction};
