use anyhow::Context;
use chainguard::clients::{CachedGeocoder, NominatimClient, OpenMeteoClient};
use chainguard::config::Config;
use chainguard::data::{
    self, fetch_weather, load_port_reference, map_ports, prepare, write_port_reference,
};
use chainguard::inference::{DelayPredictor, ShipmentFeatures};
use chainguard::ml::{load_artifact, train_model};
use chainguard::models::{Port, PORT_REFERENCE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chainguard-cli")]
#[command(about = "ChainGuard pipeline and model tooling", long_about = None)]
struct Cli {
    /// Configuration file (falls back to CHAINGUARD_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the reference port table as CSV and print it
    Ports {
        /// Output path (defaults to port_reference.csv in the processed-data dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clean the raw shipment export into the pipeline schema
    Prepare {
        /// Raw shipment CSV (defaults to the configured raw path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Cleaned output CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Geocode origin cities and assign the nearest reference port
    MapPorts {
        /// Cleaned shipment CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Port-mapped output CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Enrich port-mapped shipments with historical weekly weather
    FetchWeather {
        /// Port-mapped shipment CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Weather-enriched output CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train the delay classifier and persist the model artifact
    Train {
        /// Weather-enriched shipment CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Artifact directory (defaults to the configured models dir)
        #[arg(short, long)]
        models_dir: Option<PathBuf>,
    },

    /// Score a single shipment with the persisted model.
    ///
    /// Without flags this scores a built-in sample shipment.
    Predict {
        #[arg(long, default_value_t = 3.5)]
        weather_risk_score: f64,

        #[arg(long, default_value_t = 32.0)]
        temp_max: f64,

        #[arg(long, default_value_t = 15.0)]
        rainfall: f64,

        #[arg(long, default_value_t = 18.0)]
        wind_speed: f64,

        #[arg(long, default_value_t = 0.62)]
        port_congestion: f64,

        #[arg(long, default_value = "Second Class")]
        shipping_mode: String,

        #[arg(long, default_value = "Port of Houston")]
        nearest_port: String,

        /// Artifact directory (defaults to the configured models dir)
        #[arg(short, long)]
        models_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chainguard=info".into()),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(&path.to_string_lossy())
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading config")?,
    };

    match cli.command {
        Commands::Ports { output } => {
            let path = output
                .unwrap_or_else(|| config.data.processed_dir.join(data::PORT_REFERENCE_FILE));
            write_port_reference(&path, &PORT_REFERENCE)
                .with_context(|| format!("writing port reference to {}", path.display()))?;

            println!("Wrote {} ports to {}", PORT_REFERENCE.len(), path.display());
            for port in PORT_REFERENCE.iter() {
                println!("  {:<32} {:>9.4} {:>10.4}", port.port_name, port.lat, port.lon);
            }
        }

        Commands::Prepare { input, output } => {
            let input = input.unwrap_or_else(|| config.data.raw_path.clone());
            let output =
                output.unwrap_or_else(|| config.data.processed_dir.join(data::CLEANED_FILE));

            let summary = prepare(&input, &output)
                .with_context(|| format!("preparing {}", input.display()))?;

            println!(
                "Kept {} of {} rows ({} dropped) -> {}",
                summary.rows_out,
                summary.rows_in,
                summary.rows_dropped,
                output.display()
            );
        }

        Commands::MapPorts { input, output } => {
            let input =
                input.unwrap_or_else(|| config.data.processed_dir.join(data::CLEANED_FILE));
            let output =
                output.unwrap_or_else(|| config.data.processed_dir.join(data::WITH_PORTS_FILE));

            let ports = port_table(&config)?;
            let geocoder = CachedGeocoder::new(Arc::new(NominatimClient::new(&config.geocoding)?));

            let summary = map_ports(&input, &output, &geocoder, &ports)
                .await
                .with_context(|| format!("mapping ports for {}", input.display()))?;

            println!(
                "Mapped {} of {} rows ({} unknown, {} distinct cities) -> {}",
                summary.rows_mapped,
                summary.rows_total,
                summary.rows_unknown,
                summary.unique_cities,
                output.display()
            );
        }

        Commands::FetchWeather { input, output } => {
            let input =
                input.unwrap_or_else(|| config.data.processed_dir.join(data::WITH_PORTS_FILE));
            let output =
                output.unwrap_or_else(|| config.data.processed_dir.join(data::WITH_WEATHER_FILE));

            let ports = port_table(&config)?;
            let provider = OpenMeteoClient::new(&config.weather)?;

            let summary = fetch_weather(&input, &output, &provider, &ports)
                .await
                .with_context(|| format!("fetching weather for {}", input.display()))?;

            println!(
                "Fetched {} of {} port-week combos ({} skipped) across {} rows -> {}",
                summary.combos_fetched,
                summary.combos_total,
                summary.combos_skipped,
                summary.rows_total,
                output.display()
            );
        }

        Commands::Train { input, models_dir } => {
            let input =
                input.unwrap_or_else(|| config.data.processed_dir.join(data::WITH_WEATHER_FILE));
            let models_dir = models_dir.unwrap_or_else(|| config.data.models_dir.clone());

            let outcome = train_model(&input, &models_dir, &config.training)
                .with_context(|| format!("training from {}", input.display()))?;

            println!(
                "Trained on {} of {} rows ({} train / {} test, {} features)",
                outcome.rows_usable,
                outcome.rows_total,
                outcome.n_train,
                outcome.n_test,
                outcome.n_features
            );
            println!("  scale_pos_weight: {:.3}", outcome.scale_pos_weight);
            println!(
                "  accuracy {:.3}  precision {:.3}  recall {:.3}  f1 {:.3}",
                outcome.metrics.accuracy,
                outcome.metrics.precision,
                outcome.metrics.recall,
                outcome.metrics.f1_score
            );
            println!("Top features:");
            for (name, weight) in &outcome.top_features {
                println!("  {:<40} {:.4}", name, weight);
            }
            println!("Artifact written to {}", models_dir.display());
        }

        Commands::Predict {
            weather_risk_score,
            temp_max,
            rainfall,
            wind_speed,
            port_congestion,
            shipping_mode,
            nearest_port,
            models_dir,
        } => {
            let models_dir = models_dir.unwrap_or_else(|| config.data.models_dir.clone());
            let artifact = load_artifact(&models_dir)
                .with_context(|| format!("loading model from {}", models_dir.display()))?;
            let predictor = DelayPredictor::from_artifact(artifact)?;

            let prediction = predictor.predict(&ShipmentFeatures {
                weather_risk_score,
                temp_max,
                rainfall,
                wind_speed,
                port_congestion,
                shipping_mode,
                nearest_port,
            })?;

            let (features, importance): (Vec<String>, Vec<f64>) =
                predictor.feature_importance().into_iter().unzip();
            let body = serde_json::json!({
                "delay_probability": prediction.delay_probability,
                "delay_risk": prediction.delay_risk,
                "feature_importance": {
                    "features": features,
                    "importance": importance,
                },
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// Port table from the processed-data dir when one has been written there,
/// otherwise the built-in reference.
fn port_table(config: &Config) -> anyhow::Result<Vec<Port>> {
    let path = config.data.processed_dir.join(data::PORT_REFERENCE_FILE);
    if path.exists() {
        load_port_reference(&path)
            .with_context(|| format!("loading port reference from {}", path.display()))
    } else {
        Ok(PORT_REFERENCE.clone())
    }
}
