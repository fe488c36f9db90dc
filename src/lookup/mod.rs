//! Public-address discovery and geolocation
//!
//! Both services speak to the same HTTP lookup provider: one call
//! resolves the machine's own public address and connection metadata,
//! the other geolocates an arbitrary address.

use crate::{
    defaults,
    error::{AppError, Result},
    models::{GeoInfo, IpInfo},
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const IP_FIELDS: &str =
    "status,message,query,isp,as,country,regionName,city,lat,lon,timezone,mobile,proxy,hosting";
const GEO_FIELDS: &str = "query,country,regionName,city,lat,lon,timezone,isp";

fn lookup_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(defaults::LOOKUP_TIMEOUT)
        .user_agent(format!("{}/{}", crate::PKG_NAME, crate::VERSION))
        .build()
        .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))
}

/// Resolves the machine's public address and connection metadata.
#[derive(Clone)]
pub struct IpService {
    client: reqwest::Client,
    base_url: String,
}

impl IpService {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: lookup_client()?,
            base_url: defaults::IP_API_BASE.to_string(),
        })
    }

    /// Point the service at a different provider (tests use a local server).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// One round trip to the provider's self-lookup endpoint.
    pub async fn public_ip_info(&self, token: &CancellationToken) -> Result<IpInfo> {
        let url = format!("{}/json/?fields={IP_FIELDS}", self.base_url);
        let response = tokio::select! {
            resp = self.client.get(&url).send() => resp
                .map_err(|e| AppError::http_request(format!("public IP lookup failed: {e}")))?,
            _ = token.cancelled() => {
                return Err(AppError::timeout("public IP lookup cancelled by deadline"));
            }
        };

        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "public IP lookup returned {}",
                response.status()
            )));
        }

        let mut info: IpInfo = response
            .json()
            .await
            .map_err(|e| AppError::parse(format!("malformed public IP payload: {e}")))?;
        if info.status.as_deref() == Some("fail") {
            let reason = info.message.unwrap_or_else(|| "unspecified".to_string());
            return Err(AppError::http_request(format!(
                "lookup provider rejected the query: {reason}"
            )));
        }
        info.retrieved_at = Utc::now();
        debug!(query = ?info.query, "public IP resolved");
        Ok(info)
    }
}

/// Raw geolocation payload shape used by the lookup provider.
#[derive(Debug, Deserialize)]
struct GeoPayload {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, rename = "regionName")]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    isp: Option<String>,
}

/// Geolocates a given address through the lookup provider.
#[derive(Clone)]
pub struct GeoService {
    client: reqwest::Client,
    base_url: String,
}

impl GeoService {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: lookup_client()?,
            base_url: defaults::IP_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub async fn geo_for_ip(&self, ip: &str, token: &CancellationToken) -> Result<GeoInfo> {
        let url = format!("{}/json/{ip}?fields={GEO_FIELDS}", self.base_url);
        let response = tokio::select! {
            resp = self.client.get(&url).send() => resp
                .map_err(|e| AppError::http_request(format!("geolocation lookup failed: {e}")))?,
            _ = token.cancelled() => {
                return Err(AppError::timeout("geolocation lookup cancelled by deadline"));
            }
        };

        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "geolocation lookup returned {}",
                response.status()
            )));
        }

        let payload: GeoPayload = response
            .json()
            .await
            .map_err(|e| AppError::parse(format!("malformed geolocation payload: {e}")))?;

        Ok(GeoInfo {
            ip: payload.query.unwrap_or_else(|| ip.to_string()),
            country: payload.country.unwrap_or_default(),
            region: payload.region_name.unwrap_or_default(),
            city: payload.city.unwrap_or_default(),
            latitude: payload.lat.unwrap_or_default(),
            longitude: payload.lon.unwrap_or_default(),
            timezone: payload.timezone.unwrap_or_default(),
            provider: payload.isp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_public_ip_lookup_parses_provider_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "query": "203.0.113.9",
                "isp": "Example ISP",
                "as": "AS64496 Example",
                "country": "Netherlands",
                "regionName": "North Holland",
                "city": "Amsterdam",
                "lat": 52.37,
                "lon": 4.89,
                "timezone": "Europe/Amsterdam",
                "mobile": false,
                "proxy": false,
                "hosting": true
            })))
            .mount(&server)
            .await;

        let service = IpService::new().unwrap().with_base_url(server.uri());
        let info = service
            .public_ip_info(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(info.query.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.asn.as_deref(), Some("AS64496 Example"));
        assert!(info.hosting);
    }

    #[tokio::test]
    async fn test_provider_failure_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail",
                "message": "private range"
            })))
            .mount(&server)
            .await;

        let service = IpService::new().unwrap().with_base_url(server.uri());
        let err = service.public_ip_info(&CancellationToken::new()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_geolocation_lookup_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/203.0.113.9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "203.0.113.9",
                "country": "Netherlands",
                "regionName": "North Holland",
                "city": "Amsterdam",
                "lat": 52.37,
                "lon": 4.89,
                "timezone": "Europe/Amsterdam",
                "isp": "Example ISP"
            })))
            .mount(&server)
            .await;

        let service = GeoService::new().unwrap().with_base_url(server.uri());
        let geo = service
            .geo_for_ip("203.0.113.9", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(geo.ip, "203.0.113.9");
        assert_eq!(geo.region, "North Holland");
        assert_eq!(geo.provider.as_deref(), Some("Example ISP"));
    }

    #[tokio::test]
    async fn test_cancelled_lookup_reports_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(5))
                    .set_body_json(json!({"status": "success"})),
            )
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let service = IpService::new().unwrap().with_base_url(server.uri());
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = service.public_ip_info(&token).await;
        assert!(matches!(err, Err(AppError::Timeout(_))));
    }
}
