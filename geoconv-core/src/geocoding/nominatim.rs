use super::{GeocodeError, Geocoder, Place, Query};
use crate::coordinate::Coordinate;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings for talking to a Nominatim instance
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Base URL without trailing slash (public instance by default)
    pub base_url: String,
    /// Nominatim requires an identifying User-Agent
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum spacing between outbound requests
    pub min_interval: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
            min_interval: super::rate_limit::MIN_REQUEST_INTERVAL,
        }
    }
}

pub fn default_user_agent() -> String {
    format!(
        "geoconv/{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_REPOSITORY")
    )
}

/// Nominatim API response structure (shared by /reverse and /search)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// /reverse answers either a place or `{"error": "..."}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Place(NominatimPlace),
    Error { error: String },
}

/// Blocking Nominatim backend
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, GeocodeError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("Geocoding via {} {:?}", url, params);

        let response = self.client.get(&url).query(params).send()?;

        if !response.status().is_success() {
            return Err(GeocodeError::Network(format!(
                "Geocoding API returned status: {}",
                response.status()
            )));
        }

        Ok(response.text()?)
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &Query) -> Result<Option<Place>, GeocodeError> {
        match query {
            Query::Point(coordinate) => {
                let body = self.get(
                    "reverse",
                    &[
                        ("lat", coordinate.latitude().to_string()),
                        ("lon", coordinate.longitude().to_string()),
                        ("format", "jsonv2".to_string()),
                    ],
                )?;
                parse_reverse(&body)
            }
            Query::Address(address) => {
                let body = self.get(
                    "search",
                    &[
                        ("q", address.clone()),
                        ("format", "jsonv2".to_string()),
                        ("limit", "1".to_string()),
                    ],
                )?;
                parse_search(&body)
            }
        }
    }
}

fn parse_reverse(body: &str) -> Result<Option<Place>, GeocodeError> {
    let response: ReverseResponse = serde_json::from_str(body)
        .map_err(|e| GeocodeError::Network(format!("Failed to parse geocoding response: {}", e)))?;

    match response {
        ReverseResponse::Place(place) => place.into_place().map(Some),
        ReverseResponse::Error { error } => {
            log::debug!("Nominatim reverse lookup had no match: {}", error);
            Ok(None)
        }
    }
}

fn parse_search(body: &str) -> Result<Option<Place>, GeocodeError> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| GeocodeError::Network(format!("Failed to parse geocoding response: {}", e)))?;

    places
        .into_iter()
        .next()
        .map(NominatimPlace::into_place)
        .transpose()
}

impl NominatimPlace {
    fn into_place(self) -> Result<Place, GeocodeError> {
        let invalid = |what: &str, value: &str| {
            GeocodeError::Network(format!("Geocoding response has invalid {}: {}", what, value))
        };

        let lat: f64 = self.lat.parse().map_err(|_| invalid("lat", &self.lat))?;
        let lon: f64 = self.lon.parse().map_err(|_| invalid("lon", &self.lon))?;
        let coordinate =
            Coordinate::new(lat, lon).map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Place {
            display_name: self.display_name,
            coordinate,
        })
    }
}
