use crate::clients::CachedGeocoder;
use crate::error::Result;
use crate::metrics::PIPELINE_ROWS_TOTAL;
use crate::models::{nearest_port, CleanedShipment, Port, UNKNOWN_PORT};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct MapPortsSummary {
    pub rows_total: usize,
    pub rows_mapped: usize,
    pub rows_unknown: usize,
    pub unique_cities: usize,
}

/// Assign each cleaned shipment to its nearest reference port.
///
/// Each distinct (city, country) pair is geocoded once through the cached
/// geocoder and its coordinates matched against the port table by haversine
/// distance. Shipments whose origin cannot be geocoded keep the sentinel
/// port name rather than being dropped, so downstream stages see every row.
pub async fn map_ports(
    input_path: &Path,
    output_path: &Path,
    geocoder: &CachedGeocoder,
    ports: &[Port],
) -> Result<MapPortsSummary> {
    info!(path = %input_path.display(), "Loading cleaned shipments");

    let mut reader = csv::Reader::from_path(input_path)?;
    let shipments: Vec<CleanedShipment> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output_path)?;

    let rows_total = shipments.len();
    let mut rows_mapped = 0usize;
    let mut rows_unknown = 0usize;

    for (i, shipment) in shipments.into_iter().enumerate() {
        let port_name = match geocoder
            .resolve(&shipment.order_city, &shipment.order_country)
            .await
        {
            Some((lat, lon)) => match nearest_port(lat, lon, ports) {
                Some((port, _km)) => port.port_name.clone(),
                None => UNKNOWN_PORT.to_string(),
            },
            None => UNKNOWN_PORT.to_string(),
        };

        if port_name == UNKNOWN_PORT {
            rows_unknown += 1;
        } else {
            rows_mapped += 1;
        }
        writer.serialize(shipment.with_port(port_name))?;

        if (i + 1) % 100 == 0 {
            info!(processed = i + 1, total = rows_total, "Mapping ports");
        }
    }
    writer.flush()?;

    PIPELINE_ROWS_TOTAL
        .with_label_values(&["map_ports", "mapped"])
        .inc_by(rows_mapped as f64);
    PIPELINE_ROWS_TOTAL
        .with_label_values(&["map_ports", "unknown"])
        .inc_by(rows_unknown as f64);

    if rows_unknown > 0 {
        warn!(rows_unknown, "Origins that could not be geocoded keep the Unknown port");
    }
    info!(
        rows_total,
        rows_mapped,
        unique_cities = geocoder.cache_len(),
        path = %output_path.display(),
        "Saved shipments with ports"
    );

    Ok(MapPortsSummary {
        rows_total,
        rows_mapped,
        rows_unknown,
        unique_cities: geocoder.cache_len(),
    })
}

/// Write the port reference table as CSV.
pub fn write_port_reference(path: &Path, ports: &[Port]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for port in ports {
        writer.serialize(port)?;
    }
    writer.flush()?;
    info!(path = %path.display(), n_ports = ports.len(), "Saved port reference");
    Ok(())
}

/// Load a port reference CSV, for overriding the built-in table.
pub fn load_port_reference(path: &Path) -> Result<Vec<Port>> {
    let mut reader = csv::Reader::from_path(path)?;
    let ports: Vec<Port> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()?;
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::GeocodeProvider;
    use crate::models::{ShipmentWithPort, PORT_REFERENCE};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodeProvider for TableProvider {
        async fn geocode(&self, city: &str, _country: &str) -> Result<Option<(f64, f64)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match city {
                "Houston" => Some((29.76, -95.37)),
                "Seattle" => Some((47.61, -122.33)),
                _ => None,
            })
        }
    }

    fn cleaned(city: &str) -> CleanedShipment {
        let order_date = NaiveDate::from_ymd_opt(2018, 1, 31)
            .unwrap()
            .and_hms_opt(22, 56, 0)
            .unwrap();
        CleanedShipment {
            order_date,
            order_city: city.to_string(),
            order_country: "United States".to_string(),
            shipping_mode: "Standard Class".to_string(),
            delay_days: 1,
            order_week: "2018-01-29/2018-02-04".to_string(),
        }
    }

    fn write_cleaned(dir: &tempfile::TempDir, rows: &[CleanedShipment]) -> std::path::PathBuf {
        let path = dir.path().join("cleaned.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        for row in rows {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();
        path
    }

    #[tokio::test]
    async fn test_map_ports_assigns_nearest_port() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cleaned(&dir, &[cleaned("Houston"), cleaned("Seattle")]);
        let output = dir.path().join("with_ports.csv");

        let provider = TableProvider {
            calls: AtomicUsize::new(0),
        };
        let geocoder = CachedGeocoder::new(std::sync::Arc::new(provider));

        let summary = map_ports(&input, &output, &geocoder, &PORT_REFERENCE)
            .await
            .unwrap();
        assert_eq!(summary.rows_mapped, 2);
        assert_eq!(summary.rows_unknown, 0);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<ShipmentWithPort> = reader
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].nearest_port, "Port of Houston");
        assert_eq!(rows[1].nearest_port, "Port of Seattle");
    }

    #[tokio::test]
    async fn test_map_ports_geocodes_each_city_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cleaned(
            &dir,
            &[cleaned("Houston"), cleaned("Houston"), cleaned("Houston")],
        );
        let output = dir.path().join("with_ports.csv");

        let geocoder = CachedGeocoder::new(std::sync::Arc::new(TableProvider {
            calls: AtomicUsize::new(0),
        }));
        let summary = map_ports(&input, &output, &geocoder, &PORT_REFERENCE)
            .await
            .unwrap();
        assert_eq!(summary.rows_total, 3);
        assert_eq!(summary.unique_cities, 1);
    }

    #[tokio::test]
    async fn test_map_ports_unresolved_city_keeps_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_cleaned(&dir, &[cleaned("Atlantis")]);
        let output = dir.path().join("with_ports.csv");

        let geocoder = CachedGeocoder::new(std::sync::Arc::new(TableProvider {
            calls: AtomicUsize::new(0),
        }));
        let summary = map_ports(&input, &output, &geocoder, &PORT_REFERENCE)
            .await
            .unwrap();
        assert_eq!(summary.rows_unknown, 1);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let row: ShipmentWithPort = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(row.nearest_port, UNKNOWN_PORT);
    }

    #[test]
    fn test_port_reference_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("port_reference.csv");

        write_port_reference(&path, &PORT_REFERENCE).unwrap();
        let loaded = load_port_reference(&path).unwrap();
        assert_eq!(loaded.as_slice(), PORT_REFERENCE.as_slice());
    }
}
