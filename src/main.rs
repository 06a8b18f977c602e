use chainguard::{
    api::{build_router, AppState, ModelState},
    config::Config,
    inference::DelayPredictor,
    metrics::MODEL_LOADED,
    ml::load_artifact,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        default_config()
    });

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "chainguard={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting ChainGuard v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = chainguard::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load the trained model; a failed load degrades the service but
    // never stops it
    let models_dir = &config.data.models_dir;
    let model_state = match load_artifact(models_dir).and_then(DelayPredictor::from_artifact) {
        Ok(predictor) => {
            tracing::info!(
                n_features = predictor.columns().len(),
                "✅ Model loaded from {}",
                models_dir.display()
            );
            MODEL_LOADED.set(1.0);
            ModelState::Ready(Box::new(predictor))
        }
        Err(e) => {
            tracing::error!(
                "Model unavailable, serving degraded (train first or fix {}): {}",
                models_dir.display(),
                e
            );
            MODEL_LOADED.set(0.0);
            ModelState::Unavailable {
                reason: e.to_string(),
            }
        }
    };

    let app_state = AppState::new(model_state);
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Prediction: http://{}/predict", http_addr);
    tracing::info!("   Dashboard: http://{}/dashboard", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn default_config() -> Config {
    use chainguard::config::*;

    Config {
        server: ServerConfig {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
            request_timeout_secs: 30,
        },
        data: DataConfig::default(),
        geocoding: GeocodingConfig::default(),
        weather: WeatherConfig::default(),
        training: TrainingConfig::default(),
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            json_logs: false,
            service_name: "chainguard".to_string(),
            prometheus_enabled: true,
        },
    }
}
