use crate::clients::WeatherProvider;
use crate::error::Result;
use crate::metrics::{PIPELINE_ROWS_TOTAL, UPSTREAM_REQUESTS_TOTAL};
use crate::models::{week_start, Port, PortWeekWeather, ShipmentWithPort, UNKNOWN_PORT};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct FetchWeatherSummary {
    pub rows_total: usize,
    pub combos_total: usize,
    pub combos_fetched: usize,
    pub combos_skipped: usize,
}

/// Enrich port-mapped shipments with weekly weather observations.
///
/// One observation is fetched per distinct (port, week) pair, sampled at the
/// week's start date, then left-joined back onto every shipment. Pairs whose
/// fetch fails or returns no data are skipped and the affected rows keep
/// empty weather columns, so a partial archive never aborts the stage.
pub async fn fetch_weather(
    input_path: &Path,
    output_path: &Path,
    provider: &dyn WeatherProvider,
    ports: &[Port],
) -> Result<FetchWeatherSummary> {
    info!(path = %input_path.display(), "Loading shipments with ports");

    let mut reader = csv::Reader::from_path(input_path)?;
    let shipments: Vec<ShipmentWithPort> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;

    let coords: HashMap<&str, (f64, f64)> = ports
        .iter()
        .map(|p| (p.port_name.as_str(), (p.lat, p.lon)))
        .collect();

    // Distinct (port, week) pairs in first-occurrence order
    let mut seen = HashSet::new();
    let mut combos: Vec<(String, String)> = Vec::new();
    for s in &shipments {
        if s.nearest_port == UNKNOWN_PORT {
            continue;
        }
        let key = (s.nearest_port.clone(), s.order_week.clone());
        if seen.insert(key.clone()) {
            combos.push(key);
        }
    }
    let combos_total = combos.len();
    info!(combos_total, "Fetching weather for port-week combinations");

    let mut observations: HashMap<(String, String), PortWeekWeather> = HashMap::new();
    let mut combos_skipped = 0usize;

    for (i, (port, week)) in combos.into_iter().enumerate() {
        let Some(&(lat, lon)) = coords.get(port.as_str()) else {
            warn!(port = %port, "Port missing from reference table, skipping");
            combos_skipped += 1;
            continue;
        };

        match provider.daily(lat, lon, week_start(&week)).await {
            Ok(Some(daily)) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&["open_meteo", "success"])
                    .inc();
                observations.insert(
                    (port.clone(), week.clone()),
                    PortWeekWeather::new(port, week, daily),
                );
            }
            Ok(None) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&["open_meteo", "empty"])
                    .inc();
                combos_skipped += 1;
            }
            Err(e) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&["open_meteo", "error"])
                    .inc();
                warn!(port = %port, week = %week, error = %e, "Weather fetch failed, skipping");
                combos_skipped += 1;
            }
        }

        if (i + 1) % 50 == 0 {
            info!(processed = i + 1, total = combos_total, "Fetching weather");
        }
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output_path)?;

    let rows_total = shipments.len();
    let mut rows_enriched = 0usize;
    for shipment in shipments {
        let obs = observations.get(&(shipment.nearest_port.clone(), shipment.order_week.clone()));
        if obs.is_some() {
            rows_enriched += 1;
        }
        writer.serialize(shipment.with_weather(obs))?;
    }
    writer.flush()?;

    PIPELINE_ROWS_TOTAL
        .with_label_values(&["fetch_weather", "enriched"])
        .inc_by(rows_enriched as f64);
    PIPELINE_ROWS_TOTAL
        .with_label_values(&["fetch_weather", "missing"])
        .inc_by((rows_total - rows_enriched) as f64);

    info!(
        rows_total,
        rows_enriched,
        combos_fetched = combos_total - combos_skipped,
        combos_skipped,
        path = %output_path.display(),
        "Saved shipments with weather"
    );

    Ok(FetchWeatherSummary {
        rows_total,
        combos_total,
        combos_fetched: combos_total - combos_skipped,
        combos_skipped,
    })
}
