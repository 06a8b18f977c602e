use crate::config::GeocodingConfig;
use crate::error::{AppError, Result};
use crate::metrics::UPSTREAM_REQUESTS_TOTAL;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Forward geocoding of an origin city to coordinates
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Resolve a (city, country) pair to (lat, lon).
    ///
    /// `Ok(None)` means the service answered but found nothing; `Err` is a
    /// transport or protocol failure. Callers treat both as unresolvable.
    async fn geocode(&self, city: &str, country: &str) -> Result<Option<(f64, f64)>>;
}

/// Nominatim-compatible geocoding client.
///
/// Inserts a fixed delay after every request as required by the public
/// Nominatim usage policy. No retry or backoff on failure.
pub struct NominatimClient {
    client: Client,
    base_url: String,
    rate_limit: Duration,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimClient {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn geocode(&self, city: &str, country: &str) -> Result<Option<(f64, f64)>> {
        let query = format!("{}, {}", city, country);
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        // Courtesy delay between requests, success or not
        tokio::time::sleep(self.rate_limit).await;

        if !response.status().is_success() {
            return Err(AppError::Upstream {
                service: "nominatim".to_string(),
                message: format!("status {}", response.status()),
            });
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            debug!(city, country, "No geocoding match");
            return Ok(None);
        };

        match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Ok(Some((lat, lon))),
            _ => Err(AppError::Upstream {
                service: "nominatim".to_string(),
                message: "unparseable coordinates in response".to_string(),
            }),
        }
    }
}

/// Memoizing wrapper so each distinct (city, country) pair is fetched once
/// per pipeline run. Failures are cached too; a city that could not be
/// resolved is not retried within the run.
pub struct CachedGeocoder {
    inner: Arc<dyn GeocodeProvider>,
    cache: DashMap<String, Option<(f64, f64)>>,
}

impl CachedGeocoder {
    pub fn new(inner: Arc<dyn GeocodeProvider>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Resolve with memoization; lookup failures degrade to `None`
    pub async fn resolve(&self, city: &str, country: &str) -> Option<(f64, f64)> {
        let key = format!("{}, {}", city, country);

        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }

        let coords = match self.inner.geocode(city, country).await {
            Ok(coords) => {
                let outcome = if coords.is_some() { "success" } else { "empty" };
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&["nominatim", outcome])
                    .inc();
                coords
            }
            Err(e) => {
                UPSTREAM_REQUESTS_TOTAL
                    .with_label_values(&["nominatim", "error"])
                    .inc();
                warn!(city, country, error = %e, "Geocoding failed");
                None
            }
        };

        self.cache.insert(key, coords);
        coords
    }

    /// Number of distinct pairs resolved so far
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        answer: Option<(f64, f64)>,
    }

    #[async_trait]
    impl GeocodeProvider for CountingProvider {
        async fn geocode(&self, _city: &str, _country: &str) -> Result<Option<(f64, f64)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    #[tokio::test]
    async fn test_cache_deduplicates_lookups() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            answer: Some((29.76, -95.37)),
        });
        let cached = CachedGeocoder::new(provider.clone());

        for _ in 0..5 {
            let coords = cached.resolve("Houston", "United States").await;
            assert_eq!(coords, Some((29.76, -95.37)));
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_cache_remembers_misses() {
        struct FailingProvider;

        #[async_trait]
        impl GeocodeProvider for FailingProvider {
            async fn geocode(&self, _city: &str, _country: &str) -> Result<Option<(f64, f64)>> {
                Err(AppError::Upstream {
                    service: "nominatim".to_string(),
                    message: "boom".to_string(),
                })
            }
        }

        let cached = CachedGeocoder::new(Arc::new(FailingProvider));
        assert_eq!(cached.resolve("Nowhere", "Atlantis").await, None);
        assert_eq!(cached.resolve("Nowhere", "Atlantis").await, None);
        assert_eq!(cached.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_nominatim_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), "Houston, United States".into()),
                mockito::Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"lat": "29.7604", "lon": "-95.3698"}]"#)
            .create_async()
            .await;

        let config = GeocodingConfig {
            base_url: server.url(),
            user_agent: "chainguard-test".to_string(),
            rate_limit_ms: 0,
            timeout_secs: 5,
        };
        let client = NominatimClient::new(&config).unwrap();
        let coords = client.geocode("Houston", "United States").await.unwrap();

        mock.assert_async().await;
        let (lat, lon) = coords.unwrap();
        assert!((lat - 29.7604).abs() < 1e-9);
        assert!((lon - -95.3698).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nominatim_empty_result() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let config = GeocodingConfig {
            base_url: server.url(),
            user_agent: "chainguard-test".to_string(),
            rate_limit_ms: 0,
            timeout_secs: 5,
        };
        let client = NominatimClient::new(&config).unwrap();
        assert_eq!(client.geocode("Nowhere", "Atlantis").await.unwrap(), None);
    }
}
