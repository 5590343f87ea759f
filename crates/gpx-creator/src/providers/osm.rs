//! OpenStreetMap-backed providers: Nominatim for search and reverse geocoding,
//! OSRM for driving directions.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{DirectionsProvider, ReverseGeocoder, SearchProvider};
use crate::errors::{ProviderError, ProviderErrorKind};
use crate::models::{Coordinate, DisplayName, MapRegion, Placemark, RoutePolyline, SearchResult};

/// Nominatim returns at most this many results unless asked otherwise.
const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum OsmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rate limited, try again later")]
    RateLimited,
    #[error("Unexpected status {0}")]
    Status(u16),
    #[error("{0}")]
    Service(String),
}

impl OsmError {
    fn into_provider(self, kind: ProviderErrorKind) -> ProviderError {
        ProviderError::new(kind, self.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmConfig {
    pub nominatim_endpoint: String,
    pub osrm_endpoint: String,
    /// Nominatim's usage policy requires an identifying user agent.
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for OsmConfig {
    fn default() -> Self {
        Self {
            nominatim_endpoint: "https://nominatim.openstreetmap.org".to_string(),
            osrm_endpoint: "https://router.project-osrm.org".to_string(),
            user_agent: concat!("gpx-creator/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct NominatimAddress {
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

/// Client for the public OSM routing and geocoding services.
pub struct OsmClient {
    client: reqwest::Client,
    config: OsmConfig,
}

impl OsmClient {
    pub fn new(config: OsmConfig) -> Result<Self, OsmError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, OsmError> {
        let response = self.client.get(url).query(query).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OsmError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(OsmError::Status(response.status().as_u16()));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn search_places(
        &self,
        query: &str,
        region: Option<MapRegion>,
    ) -> Result<Vec<SearchResult>, OsmError> {
        let url = format!("{}/search", self.config.nominatim_endpoint);
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        if let Some(region) = region {
            let b = region.bounding_box();
            // left,top,right,bottom
            params.push((
                "viewbox",
                format!("{},{},{},{}", b.min_lon, b.max_lat, b.max_lon, b.min_lat),
            ));
            params.push(("bounded", "0".to_string()));
        }

        let places: Vec<NominatimPlace> = self.get_json(&url, &params).await?;
        debug!("Nominatim returned {} places for {query:?}", places.len());

        Ok(places
            .into_iter()
            .filter_map(|place| {
                let lat = place.lat.parse().ok()?;
                let lon = place.lon.parse().ok()?;
                Some(SearchResult::new(
                    DisplayName::from_optional(place.name),
                    place.display_name,
                    Coordinate::new(lat, lon),
                ))
            })
            .collect())
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<Placemark, OsmError> {
        let url = format!("{}/reverse", self.config.nominatim_endpoint);
        let params = [
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
            ("format", "jsonv2".to_string()),
        ];

        let reply: NominatimReverse = self.get_json(&url, &params).await?;
        if let Some(error) = reply.error {
            return Err(OsmError::Service(error));
        }

        let address = reply.address;
        Ok(Placemark {
            name: reply.name.filter(|n| !n.trim().is_empty()).or(address.road),
            locality: address.city.or(address.town).or(address.village),
            administrative_area: address.state,
        })
    }

    async fn route(&self, start: Coordinate, end: Coordinate) -> Result<RoutePolyline, OsmError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.config.osrm_endpoint,
            start.longitude,
            start.latitude,
            end.longitude,
            end.latitude
        );
        let params = [
            ("overview", "full".to_string()),
            ("geometries", "geojson".to_string()),
        ];

        let reply: OsrmResponse = self.get_json(&url, &params).await?;
        if reply.code != "Ok" {
            return Err(OsmError::Service(reply.message.unwrap_or(reply.code)));
        }

        let route = reply
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| OsmError::Service("No route found".to_string()))?;

        debug!("OSRM route with {} vertices", route.geometry.coordinates.len());
        Ok(route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| Coordinate::new(lat, lon))
            .collect())
    }
}

#[async_trait]
impl SearchProvider for OsmClient {
    async fn search(
        &self,
        query: &str,
        region: Option<MapRegion>,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.search_places(query, region)
            .await
            .map_err(|e| e.into_provider(ProviderErrorKind::SearchFailed))
    }
}

#[async_trait]
impl DirectionsProvider for OsmClient {
    async fn calculate_route(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RoutePolyline, ProviderError> {
        self.route(start, end)
            .await
            .map_err(|e| e.into_provider(ProviderErrorKind::RouteCalculationFailed))
    }
}

#[async_trait]
impl ReverseGeocoder for OsmClient {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<Placemark, ProviderError> {
        self.reverse(coordinate)
            .await
            .map_err(|e| e.into_provider(ProviderErrorKind::GeocodeFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_reply() {
        let json = r#"[
            {"place_id": 1, "lat": "37.7955", "lon": "-122.3937", "name": "Ferry Building",
             "display_name": "Ferry Building, The Embarcadero, San Francisco"},
            {"place_id": 2, "lat": "37.3", "lon": "-121.9", "name": "",
             "display_name": "200 E Santa Clara St, San Jose"}
        ]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(json).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(DisplayName::from_optional(places[1].name.clone()), DisplayName::Untitled);
    }

    #[test]
    fn test_parse_osrm_reply() {
        let json = r#"{"code": "Ok", "routes": [{"geometry": {"type": "LineString",
            "coordinates": [[-122.4194, 37.7749], [-121.8863, 37.3382]]}, "distance": 77000.0}]}"#;
        let reply: OsrmResponse = serde_json::from_str(json).unwrap();
        let first = reply.routes[0].geometry.coordinates[0];
        assert_eq!(first, [-122.4194, 37.7749]);
    }

    #[test]
    fn test_parse_reverse_error() {
        let reply: NominatimReverse = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(reply.error.as_deref(), Some("Unable to geocode"));
    }

    #[test]
    fn test_default_config() {
        let config = OsmConfig::default();
        assert!(config.user_agent.starts_with("gpx-creator/"));
        assert!(OsmClient::new(config).is_ok());
    }
}
