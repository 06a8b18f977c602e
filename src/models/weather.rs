use serde::{Deserialize, Serialize};

/// A single daily weather observation at a port
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyWeather {
    /// Daily maximum temperature (°C)
    pub temp_max: f64,

    /// Daily precipitation sum (mm)
    pub rainfall: f64,

    /// Daily maximum wind speed (km/h)
    pub wind_speed: f64,
}

impl DailyWeather {
    /// Composite weather severity, fixed weights over raw units
    pub fn risk_score(&self) -> f64 {
        self.rainfall * 0.5 + self.wind_speed * 0.3 + self.temp_max * 0.2
    }
}

/// Weather for one (port, week) combination, keyed for the left-join back
/// onto shipments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortWeekWeather {
    pub nearest_port: String,
    pub order_week: String,
    pub temp_max: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub weather_risk_score: f64,
}

impl PortWeekWeather {
    pub fn new(nearest_port: String, order_week: String, weather: DailyWeather) -> Self {
        Self {
            nearest_port,
            order_week,
            temp_max: weather.temp_max,
            rainfall: weather.rainfall,
            wind_speed: weather.wind_speed,
            weather_risk_score: weather.risk_score(),
        }
    }
}
