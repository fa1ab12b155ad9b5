//! Geocoding collaborator: free text to ranked candidate boundaries.

use std::time::Duration;

use async_trait::async_trait;
use geo_types::Geometry;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::bbox::BoundingBox;
use crate::error::{ExtractError, Result};

/// One geocoding hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    /// Short display name, compared against division names
    pub name: String,
    /// Rough boundary of the place
    pub geometry: Geometry<f64>,
}

/// Turns free text into candidates, best match first.
///
/// An empty result is not an error; the resolver reports it as not found.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>>;
}

/// Geocoder backed by a Nominatim `search` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    /// `[south, north, west, east]` as strings
    #[serde(default)]
    boundingbox: Option<[String; 4]>,
    #[serde(default)]
    geojson: Option<geojson::Geometry>,
}

impl NominatimGeocoder {
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidArgument`] if `endpoint` is not a URL or
    /// the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ExtractError::invalid_argument("nominatim_url", e.to_string()))?;
        let client = Client::builder()
            .user_agent(concat!("geoextract/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::invalid_argument("nominatim_url", e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "jsonv2")
            .append_pair("limit", "1")
            .append_pair("polygon_geojson", "1");
        url
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>> {
        let url = self.search_url(query);
        debug!("Geocoding via {url}");

        let unavailable = |message: String| ExtractError::GeocodeUnavailable {
            query: query.to_string(),
            message,
        };
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| unavailable(e.to_string()))?
            .text()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        parse_nominatim_response(&body).map_err(unavailable)
    }
}

/// Decode a `jsonv2` search response.
///
/// Places that carry neither a polygon nor a bounding box are skipped.
pub fn parse_nominatim_response(body: &str) -> std::result::Result<Vec<GeocodeCandidate>, String> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| format!("unexpected response: {e}"))?;

    let mut candidates = Vec::with_capacity(places.len());
    for place in places {
        let Some(name) = place
            .name
            .filter(|n| !n.is_empty())
            .or(place.display_name)
        else {
            continue;
        };
        let geometry = match (place.geojson, place.boundingbox) {
            (Some(geojson), _) => datafusion_shared::geometry_from_geojson_value(geojson)
                .map_err(|e| e.to_string())?,
            (None, Some(bbox)) => bbox_geometry(&bbox)?,
            (None, None) => continue,
        };
        candidates.push(GeocodeCandidate { name, geometry });
    }
    Ok(candidates)
}

fn bbox_geometry(raw: &[String; 4]) -> std::result::Result<Geometry<f64>, String> {
    let mut values = [0.0_f64; 4];
    for (value, text) in values.iter_mut().zip(raw) {
        *value = text
            .parse()
            .map_err(|_| format!("invalid boundingbox value '{text}'"))?;
    }
    let [south, north, west, east] = values;
    let bbox = BoundingBox::new(west, south, east, north).map_err(|e| e.to_string())?;
    Ok(Geometry::Polygon(bbox.to_polygon()))
}
