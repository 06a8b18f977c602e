use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Data pipeline paths
    #[serde(default)]
    pub data: DataConfig,

    /// Geocoding client configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Weather client configuration
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Model training configuration
    #[serde(default)]
    pub training: TrainingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CHAINGUARD_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layering defaults, an optional file and the environment
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: CHAINGUARD)
            .add_source(
                config::Environment::with_prefix("CHAINGUARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Locations of the pipeline inputs and outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Raw shipment export
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,

    /// Directory for intermediate pipeline CSVs
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Directory for the persisted model artifact
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            processed_dir: default_processed_dir(),
            models_dir: default_models_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Nominatim-compatible base URL
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,

    /// Identifying User-Agent required by the Nominatim usage policy
    #[serde(default = "default_geocoding_user_agent")]
    pub user_agent: String,

    /// Delay between geocoding requests (milliseconds)
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            user_agent: default_geocoding_user_agent(),
            rate_limit_ms: default_rate_limit_ms(),
            timeout_secs: default_geocoding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Open-Meteo archive base URL
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of boosting rounds
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Learning rate (shrinkage)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Row subsample ratio per tree
    #[serde(default = "default_subsample")]
    pub subsample: f64,

    /// Column subsample ratio per tree
    #[serde(default = "default_subsample")]
    pub colsample_bytree: f64,

    /// Minimum samples per leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    /// Held-out fraction for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// RNG seed for the split and the sampler
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Probability cutoff used when computing evaluation metrics
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            subsample: default_subsample(),
            colsample_bytree: default_subsample(),
            min_samples_leaf: default_min_samples_leaf(),
            test_size: default_test_size(),
            seed: default_seed(),
            decision_threshold: default_decision_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_raw_path() -> PathBuf {
    "data/raw_shipments.csv".into()
}

fn default_processed_dir() -> PathBuf {
    "data".into()
}

fn default_models_dir() -> PathBuf {
    "models".into()
}

fn default_geocoding_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocoding_user_agent() -> String {
    "chainguard-port-mapper".to_string()
}

fn default_rate_limit_ms() -> u64 {
    1000
}

fn default_geocoding_timeout() -> u64 {
    10
}

fn default_weather_base_url() -> String {
    "https://archive-api.open-meteo.com/v1/archive".to_string()
}

fn default_weather_timeout() -> u64 {
    15
}

fn default_n_estimators() -> usize {
    200
}

fn default_max_depth() -> usize {
    6
}

fn default_learning_rate() -> f64 {
    0.08
}

fn default_subsample() -> f64 {
    1.0
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_decision_threshold() -> f64 {
    0.4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "chainguard".to_string()
}

fn default_true() -> bool {
    true
}
