pub mod geocode;
pub mod meteo;

pub use geocode::{CachedGeocoder, GeocodeProvider, NominatimClient};
pub use meteo::{OpenMeteoClient, WeatherProvider};
