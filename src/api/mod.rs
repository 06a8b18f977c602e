pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::error::{AppError, Result};
use crate::inference::DelayPredictor;
use std::sync::Arc;

/// Outcome of the startup artifact load.
///
/// There is no retry path: a service that starts without a model stays
/// degraded until it is restarted with a valid artifact in place.
pub enum ModelState {
    Ready(Box<DelayPredictor>),
    Unavailable { reason: String },
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelState>,
}

impl AppState {
    pub fn new(model: ModelState) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    /// The loaded predictor, or the unavailability error for handlers to return
    pub fn predictor(&self) -> Result<&DelayPredictor> {
        match self.model.as_ref() {
            ModelState::Ready(predictor) => Ok(predictor),
            ModelState::Unavailable { reason } => {
                Err(AppError::ModelUnavailable(reason.clone()))
            }
        }
    }

    pub fn model_loaded(&self) -> bool {
        matches!(self.model.as_ref(), ModelState::Ready(_))
    }
}
