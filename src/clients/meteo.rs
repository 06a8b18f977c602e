use crate::config::WeatherConfig;
use crate::error::{AppError, Result};
use crate::models::DailyWeather;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Historical daily weather lookup at a coordinate
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch the daily observation for `date` (YYYY-MM-DD).
    ///
    /// `Ok(None)` when the archive has no data for that day.
    async fn daily(&self, lat: f64, lon: f64, date: &str) -> Result<Option<DailyWeather>>;
}

/// Open-Meteo archive API client
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<DailySeries>,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
    windspeed_10m_max: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn daily(&self, lat: f64, lon: f64, date: &str) -> Result<Option<DailyWeather>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string().as_str()),
                ("longitude", lon.to_string().as_str()),
                ("start_date", date),
                ("end_date", date),
                (
                    "daily",
                    "temperature_2m_max,precipitation_sum,windspeed_10m_max",
                ),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream {
                service: "open_meteo".to_string(),
                message: format!("status {}", response.status()),
            });
        }

        let body: ArchiveResponse = response.json().await?;
        let Some(daily) = body.daily else {
            return Ok(None);
        };

        let first = |series: &[Option<f64>]| series.first().copied().flatten();
        match (
            first(&daily.temperature_2m_max),
            first(&daily.precipitation_sum),
            first(&daily.windspeed_10m_max),
        ) {
            (Some(temp_max), Some(rainfall), Some(wind_speed)) => Ok(Some(DailyWeather {
                temp_max,
                rainfall,
                wind_speed,
            })),
            _ => Ok(None),
        }
    }
}
