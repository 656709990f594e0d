use crate::config::EndpointsConfig;
use crate::models::{EnrichmentRecord, IpResponse, ReverseGeocodeResponse};
use color_eyre::Result;
use reqwest::Client;

/// HTTP client for the three upstream services: reverse geocoding, public
/// IP lookup, and the form-data persistence endpoint. Cheap to clone into
/// spawned tasks; the inner `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: EndpointsConfig,
}

impl ApiClient {
    pub fn new(endpoints: EndpointsConfig) -> Self {
        Self {
            // Nominatim rejects requests without a User-Agent. No request
            // timeout: every call is allowed to settle on its own.
            client: Client::builder()
                .user_agent(concat!("geoform-tui/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap(),
            endpoints,
        }
    }

    /// Reverse-geocodes a coordinate. Non-finite inputs are formatted as-is
    /// ("NaN") and surface as the service's error response.
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<ReverseGeocodeResponse> {
        let res = self
            .client
            .get(&self.endpoints.reverse_geocode_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?
            .json::<ReverseGeocodeResponse>()
            .await?;
        Ok(res)
    }

    /// Queries the public-IP service with no parameters.
    pub async fn fetch_ip(&self) -> Result<IpResponse> {
        let res = self
            .client
            .get(&self.endpoints.ip_lookup_url)
            .send()
            .await?
            .json::<IpResponse>()
            .await?;
        Ok(res)
    }

    /// Submits a completed record as a JSON POST. Any OK-class status is
    /// success; the response body is ignored.
    pub async fn submit_record(&self, record: &EnrichmentRecord) -> Result<()> {
        self.client
            .post(&self.endpoints.form_submit_url)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn client_builds_with_default_endpoints() {
        let api = ApiClient::new(Config::default().endpoints);
        assert!(api.endpoints.reverse_geocode_url.contains("nominatim"));
    }

    #[test]
    fn ip_response_tolerates_missing_field() {
        let resp: IpResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.ip.is_none());
        let resp: IpResponse = serde_json::from_str(r#"{"ip":"203.0.113.7"}"#).unwrap();
        assert_eq!(resp.ip.as_deref(), Some("203.0.113.7"));
    }
}
