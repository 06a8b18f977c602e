/// Prometheus metrics for the delay-risk service.
///
/// Covers the three surfaces that matter operationally: prediction serving,
/// the offline data pipeline, and the upstream geocoding/weather APIs.
use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Total number of predictions served
    ///
    /// Labels: risk (low/medium/high)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of predictions served")
            .namespace("chainguard"),
        &["risk"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Prediction latency in seconds, feature alignment included
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace("chainguard")
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Rows processed by the data pipeline
    ///
    /// Labels: stage (prepare/map_ports/fetch_weather), outcome
    pub static ref PIPELINE_ROWS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("pipeline_rows_total", "Rows processed by the data pipeline")
            .namespace("chainguard"),
        &["stage", "outcome"]
    ).expect("Failed to create PIPELINE_ROWS_TOTAL metric");

    /// Requests issued to upstream APIs
    ///
    /// Labels: service (nominatim/open_meteo), outcome (success/empty/error)
    pub static ref UPSTREAM_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("upstream_requests_total", "Requests issued to upstream APIs")
            .namespace("chainguard"),
        &["service", "outcome"]
    ).expect("Failed to create UPSTREAM_REQUESTS_TOTAL metric");

    /// Whether a trained model is loaded (1) or the service is degraded (0)
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a trained model is loaded")
            .namespace("chainguard")
    ).expect("Failed to create MODEL_LOADED metric");
}

/// Register all metrics with the global registry. Call once at startup.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PIPELINE_ROWS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Encode the registry in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
