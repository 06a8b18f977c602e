use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Date format used by the raw shipment export
pub const RAW_DATE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// A cleaned shipment row, output of the prepare stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanedShipment {
    /// Order placement timestamp
    pub order_date: NaiveDateTime,

    /// Origin city
    pub order_city: String,

    /// Origin country
    pub order_country: String,

    /// Carrier class, e.g. "Standard Class"
    pub shipping_mode: String,

    /// Actual minus scheduled transit days
    pub delay_days: i64,

    /// Week bucket, `YYYY-MM-DD/YYYY-MM-DD`
    pub order_week: String,
}

impl CleanedShipment {
    /// Binary delay label: late iff the shipment overran its schedule
    pub fn delay_flag(&self) -> u8 {
        u8::from(self.delay_days > 0)
    }

    /// Attach a resolved port
    pub fn with_port(self, nearest_port: String) -> ShipmentWithPort {
        ShipmentWithPort {
            order_date: self.order_date,
            order_city: self.order_city,
            order_country: self.order_country,
            shipping_mode: self.shipping_mode,
            delay_days: self.delay_days,
            order_week: self.order_week,
            nearest_port,
        }
    }
}

/// A shipment with its nearest reference port resolved.
///
/// CSV rows are flat, so the cleaned fields are repeated rather than nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentWithPort {
    pub order_date: NaiveDateTime,
    pub order_city: String,
    pub order_country: String,
    pub shipping_mode: String,
    pub delay_days: i64,
    pub order_week: String,

    /// Nearest reference port, or [`crate::models::UNKNOWN_PORT`] when
    /// geocoding failed
    pub nearest_port: String,
}

impl ShipmentWithPort {
    pub fn delay_flag(&self) -> u8 {
        u8::from(self.delay_days > 0)
    }

    /// Attach a weather observation (or none, for the left-join miss case)
    pub fn with_weather(self, weather: Option<&crate::models::PortWeekWeather>) -> EnrichedShipment {
        EnrichedShipment {
            order_date: self.order_date,
            order_city: self.order_city,
            order_country: self.order_country,
            shipping_mode: self.shipping_mode,
            delay_days: self.delay_days,
            order_week: self.order_week,
            nearest_port: self.nearest_port,
            temp_max: weather.map(|w| w.temp_max),
            rainfall: weather.map(|w| w.rainfall),
            wind_speed: weather.map(|w| w.wind_speed),
            weather_risk_score: weather.map(|w| w.weather_risk_score),
        }
    }
}

/// A shipment joined with its port-week weather observation.
///
/// Weather fields are `None` for rows whose port was unresolved or whose
/// weather fetch failed; such rows survive the left-join as empty CSV
/// fields and are dropped at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedShipment {
    pub order_date: NaiveDateTime,
    pub order_city: String,
    pub order_country: String,
    pub shipping_mode: String,
    pub delay_days: i64,
    pub order_week: String,
    pub nearest_port: String,

    pub temp_max: Option<f64>,
    pub rainfall: Option<f64>,
    pub wind_speed: Option<f64>,
    pub weather_risk_score: Option<f64>,
}

impl EnrichedShipment {
    pub fn delay_flag(&self) -> u8 {
        u8::from(self.delay_days > 0)
    }

    /// True when every weather field is present and the port is resolved
    pub fn is_complete(&self) -> bool {
        self.nearest_port != crate::models::UNKNOWN_PORT
            && self.temp_max.is_some()
            && self.rainfall.is_some()
            && self.wind_speed.is_some()
            && self.weather_risk_score.is_some()
    }
}

/// Monday-start calendar week bucket for a date, formatted `start/end`.
///
/// The start date (text before the `/`) is the one used for weather lookups.
pub fn week_bucket(date: NaiveDate) -> String {
    let start = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let end = start + Duration::days(6);
    format!("{}/{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

/// Extract the week start date from a `start/end` bucket string
pub fn week_start(week: &str) -> &str {
    week.split('/').next().unwrap_or(week)
}

/// Risk tier assigned to a predicted delay probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a positive-class probability into a risk tier
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.65 {
            RiskLevel::High
        } else if probability > 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}
