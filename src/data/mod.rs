pub mod ports;
pub mod prepare;
pub mod weather;

pub use ports::{load_port_reference, map_ports, write_port_reference, MapPortsSummary};
pub use prepare::{prepare, PrepareSummary};
pub use weather::{fetch_weather, FetchWeatherSummary};

/// File names of the pipeline stage outputs, under the processed-data dir
pub const CLEANED_FILE: &str = "cleaned_shipments.csv";
pub const WITH_PORTS_FILE: &str = "shipments_with_ports.csv";
pub const WITH_WEATHER_FILE: &str = "shipments_with_weather.csv";
pub const PORT_REFERENCE_FILE: &str = "port_reference.csv";
