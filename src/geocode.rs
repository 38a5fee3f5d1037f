//! Google Geocoding lookups for listings without coordinates

use crate::error::GeocodeError;
use crate::models::Coordinates;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Client for the Google Geocoding JSON API
pub struct Geocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Geocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Look up coordinates for the non-blank address parts, UK biased
    pub async fn geocode(&self, parts: &[&str]) -> Result<Coordinates, GeocodeError> {
        let address = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        debug!("Geocoding address: {}", address);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("address", address.as_str()),
                ("sensor", "false"),
                ("region", "gb"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let body: GeocodeResponse = response.json().await.map_err(|_| GeocodeError::Parse)?;

        if body.status != "OK" {
            return Err(GeocodeError::Status(body.status));
        }

        let location = &body.results.first().ok_or(GeocodeError::Parse)?.geometry.location;
        Ok(Coordinates {
            latitude: location.lat.to_string(),
            longitude: location.lng.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_geocode_ok() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/geocode")
                    .query_param("address", "1 High Street, AB1 2CD")
                    .query_param("region", "gb")
                    .query_param("key", "secret");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [{ "geometry": { "location": { "lat": 52.25, "lng": -1.5 } } }]
                }));
            })
            .await;

        let geocoder = Geocoder::new(server.url("/geocode"), "secret").unwrap();
        let coords = geocoder.geocode(&["1 High Street", " ", "AB1 2CD"]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(coords.latitude, "52.25");
        assert_eq!(coords.longitude, "-1.5");
    }

    #[tokio::test]
    async fn test_geocode_bad_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/geocode");
                then.status(200).json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
            })
            .await;

        let geocoder = Geocoder::new(server.url("/geocode"), "secret").unwrap();
        let err = geocoder.geocode(&["Nowhere"]).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status(s) if s == "ZERO_RESULTS"));
    }

    #[tokio::test]
    async fn test_geocode_garbage_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/geocode");
                then.status(200).body("<xml/>");
            })
            .await;

        let geocoder = Geocoder::new(server.url("/geocode"), "secret").unwrap();
        assert!(matches!(geocoder.geocode(&["x"]).await, Err(GeocodeError::Parse)));
    }
}
