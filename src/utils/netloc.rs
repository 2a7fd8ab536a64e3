use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::provider::{Provider, ProviderChain};

/// Coarse location derived from the caller's network address.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLocation {
    #[schema(example = "IP Dhaka, Dhaka Division, Bangladesh")]
    pub label: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[schema(example = "ipapi", value_type = String)]
    pub source: &'static str,
}

fn compose_label(city: Option<&str>, region: Option<&str>, country: Option<&str>) -> String {
    let parts: Vec<&str> = [city, region, country]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect();
    if parts.is_empty() {
        "IP location".to_string()
    } else {
        format!("IP {}", parts.join(", "))
    }
}

pub struct IpapiProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IpapiResponse {
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn ipapi_location(body: IpapiResponse) -> Option<NetworkLocation> {
    Some(NetworkLocation {
        label: compose_label(
            body.city.as_deref(),
            body.region.as_deref(),
            body.country_name.as_deref(),
        ),
        latitude: body.latitude,
        longitude: body.longitude,
        source: "ipapi",
    })
}

#[async_trait]
impl Provider<(), NetworkLocation> for IpapiProvider {
    fn name(&self) -> &'static str {
        "ipapi"
    }

    async fn attempt(&self, _input: &()) -> Result<Option<NetworkLocation>> {
        let body: IpapiResponse = self
            .client
            .get("https://ipapi.co/json/")
            .header("User-Agent", "attendance-app")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ipapi_location(body))
    }
}

pub struct IpwhoisProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IpwhoisResponse {
    success: Option<bool>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn ipwhois_location(body: IpwhoisResponse) -> Option<NetworkLocation> {
    // the provider reports failures in-band rather than via HTTP status
    if body.success == Some(false) {
        return None;
    }
    Some(NetworkLocation {
        label: compose_label(
            body.city.as_deref(),
            body.region.as_deref(),
            body.country.as_deref(),
        ),
        latitude: body.latitude,
        longitude: body.longitude,
        source: "ipwhois",
    })
}

#[async_trait]
impl Provider<(), NetworkLocation> for IpwhoisProvider {
    fn name(&self) -> &'static str {
        "ipwhois"
    }

    async fn attempt(&self, _input: &()) -> Result<Option<NetworkLocation>> {
        let body: IpwhoisResponse = self
            .client
            .get("https://ipwho.is/")
            .header("User-Agent", "attendance-app")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ipwhois_location(body))
    }
}

pub struct IpApiComProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IpApiComResponse {
    status: Option<String>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn ip_api_com_location(body: IpApiComResponse) -> Option<NetworkLocation> {
    if body.status.as_deref() != Some("success") {
        return None;
    }
    Some(NetworkLocation {
        label: compose_label(
            body.city.as_deref(),
            body.region_name.as_deref(),
            body.country.as_deref(),
        ),
        latitude: body.lat,
        longitude: body.lon,
        source: "ipapi-com",
    })
}

#[async_trait]
impl Provider<(), NetworkLocation> for IpApiComProvider {
    fn name(&self) -> &'static str {
        "ipapi-com"
    }

    async fn attempt(&self, _input: &()) -> Result<Option<NetworkLocation>> {
        let body: IpApiComResponse = self
            .client
            .get("http://ip-api.com/json/")
            .header("User-Agent", "attendance-app")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ip_api_com_location(body))
    }
}

pub fn network_location_chain(client: &reqwest::Client) -> ProviderChain<(), NetworkLocation> {
    ProviderChain::new(vec![
        Box::new(IpapiProvider {
            client: client.clone(),
        }) as Box<dyn Provider<(), NetworkLocation>>,
        Box::new(IpwhoisProvider {
            client: client.clone(),
        }),
        Box::new(IpApiComProvider {
            client: client.clone(),
        }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_label() {
        assert_eq!(
            compose_label(Some("Dhaka"), Some("Dhaka Division"), Some("Bangladesh")),
            "IP Dhaka, Dhaka Division, Bangladesh"
        );
        assert_eq!(compose_label(None, None, Some("Bangladesh")), "IP Bangladesh");
        assert_eq!(compose_label(None, None, None), "IP location");
        assert_eq!(compose_label(Some("  "), None, None), "IP location");
    }

    #[test]
    fn test_ipwhois_failure_flag_is_opt_out() {
        let body: IpwhoisResponse =
            serde_json::from_str(r#"{"success": false, "city": "Nowhere"}"#).unwrap();
        assert_eq!(ipwhois_location(body), None);

        let ok: IpwhoisResponse = serde_json::from_str(
            r#"{"success": true, "city": "Dhaka", "country": "Bangladesh", "latitude": 23.8, "longitude": 90.4}"#,
        )
        .unwrap();
        let loc = ipwhois_location(ok).unwrap();
        assert_eq!(loc.label, "IP Dhaka, Bangladesh");
        assert_eq!(loc.latitude, Some(23.8));
    }

    #[test]
    fn test_ip_api_com_requires_success_status() {
        let body: IpApiComResponse =
            serde_json::from_str(r#"{"status": "fail", "city": "Nowhere"}"#).unwrap();
        assert_eq!(ip_api_com_location(body), None);

        let ok: IpApiComResponse = serde_json::from_str(
            r#"{"status": "success", "city": "Dhaka", "regionName": "Dhaka Division", "country": "Bangladesh", "lat": 23.8, "lon": 90.4}"#,
        )
        .unwrap();
        let loc = ip_api_com_location(ok).unwrap();
        assert_eq!(loc.label, "IP Dhaka, Dhaka Division, Bangladesh");
        assert_eq!(loc.source, "ipapi-com");
    }

    #[test]
    fn test_ipapi_has_no_failure_flag() {
        let body: IpapiResponse = serde_json::from_str(
            r#"{"city": "Dhaka", "region": "Dhaka Division", "country_name": "Bangladesh"}"#,
        )
        .unwrap();
        let loc = ipapi_location(body).unwrap();
        assert_eq!(loc.label, "IP Dhaka, Dhaka Division, Bangladesh");
        assert_eq!(loc.source, "ipapi");
    }
}
