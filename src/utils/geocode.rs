use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::utils::provider::{Provider, ProviderChain};

#[derive(Debug, Clone, Copy)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub label: String,
    pub source: &'static str,
}

/// Deterministic label used when every geocode provider fails or opts out.
pub fn format_gps_label(latitude: f64, longitude: f64, accuracy: Option<f64>) -> String {
    let acc = accuracy
        .map(|a| format!(" (+/-{}m)", a.round() as i64))
        .unwrap_or_default();
    format!("GPS {:.5}, {:.5}{}", latitude, longitude, acc)
}

pub struct NominatimProvider {
    client: reqwest::Client,
    user_agent: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
}

#[async_trait]
impl Provider<GeoPoint, GeocodeResult> for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn attempt(&self, input: &GeoPoint) -> Result<Option<GeocodeResult>> {
        let url = format!(
            "https://nominatim.openstreetmap.org/reverse?format=jsonv2&lat={}&lon={}&zoom=18&addressdetails=1",
            input.latitude, input.longitude
        );
        let body: NominatimResponse = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", &self.language)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.display_name.map(|label| GeocodeResult {
            label,
            source: "nominatim",
        }))
    }
}

pub struct MapboxProvider {
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapboxResponse {
    features: Option<Vec<MapboxFeature>>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    place_name: Option<String>,
}

#[async_trait]
impl Provider<GeoPoint, GeocodeResult> for MapboxProvider {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    async fn attempt(&self, input: &GeoPoint) -> Result<Option<GeocodeResult>> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };
        let url = format!(
            "https://api.mapbox.com/geocoding/v5/mapbox.places/{},{}.json?access_token={}",
            input.longitude, input.latitude, token
        );
        let body: MapboxResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(first_mapbox_label(body).map(|label| GeocodeResult {
            label,
            source: "mapbox",
        }))
    }
}

fn first_mapbox_label(body: MapboxResponse) -> Option<String> {
    body.features?.into_iter().next()?.place_name
}

pub struct GoogleProvider {
    client: reqwest::Client,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: Option<String>,
    results: Option<Vec<GoogleResultEntry>>,
}

#[derive(Debug, Deserialize)]
struct GoogleResultEntry {
    formatted_address: Option<String>,
}

#[async_trait]
impl Provider<GeoPoint, GeocodeResult> for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn attempt(&self, input: &GeoPoint) -> Result<Option<GeocodeResult>> {
        let Some(key) = self.key.as_deref() else {
            return Ok(None);
        };
        let url = format!(
            "https://maps.googleapis.com/maps/api/geocode/json?latlng={},{}&key={}",
            input.latitude, input.longitude, key
        );
        let body: GoogleResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(first_google_label(body).map(|label| GeocodeResult {
            label,
            source: "google",
        }))
    }
}

fn first_google_label(body: GoogleResponse) -> Option<String> {
    if let Some(status) = body.status.as_deref() {
        if status != "OK" {
            return None;
        }
    }
    body.results?.into_iter().next()?.formatted_address
}

/// Configuration selects exactly one active provider; the GPS fallback label
/// stays with the registrar, outside the chain.
pub fn geocode_chain(config: &Config, client: &reqwest::Client) -> ProviderChain<GeoPoint, GeocodeResult> {
    let provider: Box<dyn Provider<GeoPoint, GeocodeResult>> =
        match config.reverse_geocode_provider.as_str() {
            "mapbox" => Box::new(MapboxProvider {
                client: client.clone(),
                token: config.mapbox_token.clone(),
            }),
            "google" => Box::new(GoogleProvider {
                client: client.clone(),
                key: config.google_maps_key.clone(),
            }),
            _ => Box::new(NominatimProvider {
                client: client.clone(),
                user_agent: config.reverse_geocode_user_agent.clone(),
                language: config.reverse_geocode_language.clone(),
            }),
        };

    ProviderChain::new(vec![provider])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gps_label() {
        assert_eq!(
            format_gps_label(23.8103, 90.4125, Some(12.4)),
            "GPS 23.81030, 90.41250 (+/-12m)"
        );
        assert_eq!(
            format_gps_label(-33.8688, 151.2093, None),
            "GPS -33.86880, 151.20930"
        );
    }

    #[test]
    fn test_mapbox_label_extraction() {
        let body: MapboxResponse = serde_json::from_str(
            r#"{"features": [{"place_name": "Dhaka, Bangladesh"}, {"place_name": "Elsewhere"}]}"#,
        )
        .unwrap();
        assert_eq!(first_mapbox_label(body), Some("Dhaka, Bangladesh".to_string()));

        let empty: MapboxResponse = serde_json::from_str(r#"{"features": []}"#).unwrap();
        assert_eq!(first_mapbox_label(empty), None);
    }

    #[test]
    fn test_google_non_ok_status_is_skipped() {
        let body: GoogleResponse = serde_json::from_str(
            r#"{"status": "ZERO_RESULTS", "results": [{"formatted_address": "should not be used"}]}"#,
        )
        .unwrap();
        assert_eq!(first_google_label(body), None);

        let ok: GoogleResponse = serde_json::from_str(
            r#"{"status": "OK", "results": [{"formatted_address": "1 Example St"}]}"#,
        )
        .unwrap();
        assert_eq!(first_google_label(ok), Some("1 Example St".to_string()));
    }

    #[actix_web::test]
    async fn test_unconfigured_mapbox_opts_out() {
        let provider = MapboxProvider {
            client: reqwest::Client::new(),
            token: None,
        };
        let point = GeoPoint {
            latitude: 0.0,
            longitude: 0.0,
        };
        assert_eq!(provider.attempt(&point).await.unwrap(), None);
    }
}
