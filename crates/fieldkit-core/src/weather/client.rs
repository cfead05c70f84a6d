//! HTTP client for the weather provider.
//!
//! Every failure (transport error, non-2xx status, malformed body) is logged
//! and collapses into an empty [`ForecastBundle`]. There are no retries.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use super::{Coordinates, ForecastBundle, WeatherResponse, Zipcode};
use crate::config::WeatherConfig;
use crate::error::{FieldkitError, Result};

/// Country suffix appended to zipcode queries.
const ZIPCODE_COUNTRY: &str = "US";

/// Client for a `?format=j1` weather provider.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: Url,
}

impl WeatherClient {
    /// Create a client for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FieldkitError::ConfigValidationError(format!("weather.base_url: {e}"))
        })?;

        let mut builder =
            reqwest::Client::builder().user_agent(concat!("fieldkit/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            FieldkitError::ConfigValidationError(format!("weather client: {e}"))
        })?;

        Ok(Self { client, base_url })
    }

    /// Forecast for a US zipcode.
    pub async fn fetch_by_zipcode(&self, zipcode: &Zipcode) -> ForecastBundle {
        self.fetch(&format!("{zipcode},{ZIPCODE_COUNTRY}"))
            .await
            .map_or_else(ForecastBundle::empty, ForecastBundle::from_response)
    }

    /// Forecast for a geographic position.
    pub async fn fetch_by_coordinates(&self, coordinates: Coordinates) -> ForecastBundle {
        let location = format!("{},{}", coordinates.latitude(), coordinates.longitude());
        self.fetch(&location)
            .await
            .map_or_else(ForecastBundle::empty, ForecastBundle::from_response)
    }

    /// Current temperature in °F for a zipcode, or an empty string on failure.
    pub async fn fetch_current_temperature(&self, zipcode: &Zipcode) -> String {
        self.fetch(&format!("{zipcode},{ZIPCODE_COUNTRY}"))
            .await
            .and_then(|response| response.current_condition.into_iter().next())
            .map(|condition| condition.temp_f)
            .unwrap_or_default()
    }

    async fn fetch(&self, location: &str) -> Option<WeatherResponse> {
        let url = self.location_url(location)?;
        debug!(%url, "Requesting weather");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(location, error = %e, "Weather request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(location, %status, "Weather provider returned an error status");
            return None;
        }

        match response.json::<WeatherResponse>().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(location, error = %e, "Weather response was not valid JSON");
                None
            }
        }
    }

    fn location_url(&self, location: &str) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.pop_if_empty().push(location);
        url.query_pairs_mut().append_pair("format", "j1");
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::test_provider::{StubProvider, THREE_DAY_BODY};
    use axum::http::StatusCode;

    fn client_for(base_url: &str) -> WeatherClient {
        WeatherClient::new(&WeatherConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: Some(5),
        })
        .unwrap()
    }

    #[test]
    fn test_location_url() {
        let client = client_for("https://wttr.in");
        let url = client.location_url("10001,US").unwrap();
        assert_eq!(url.as_str(), "https://wttr.in/10001,US?format=j1");

        let client = client_for("http://localhost:8080/proxy/");
        let url = client.location_url("40.75,-73.99").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/40.75,-73.99?format=j1");
    }

    #[tokio::test]
    async fn test_fetch_by_zipcode() {
        let provider = StubProvider::spawn(vec![("/10001,US", StatusCode::OK, THREE_DAY_BODY)]).await;
        let client = client_for(&provider.base_url);

        let bundle = client.fetch_by_zipcode(&Zipcode::parse("10001").unwrap()).await;
        assert_eq!(bundle.weather.len(), 3);
        assert_eq!(bundle.area_name, "New York");
    }

    #[tokio::test]
    async fn test_fetch_by_coordinates() {
        let provider =
            StubProvider::spawn(vec![("/40.75,-73.99", StatusCode::OK, THREE_DAY_BODY)]).await;
        let client = client_for(&provider.base_url);

        let coordinates = Coordinates::new(40.75, -73.99).unwrap();
        let bundle = client.fetch_by_coordinates(coordinates).await;
        assert!(!bundle.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_gives_empty_bundle() {
        let provider = StubProvider::spawn(vec![(
            "/10001,US",
            StatusCode::SERVICE_UNAVAILABLE,
            THREE_DAY_BODY,
        )])
        .await;
        let client = client_for(&provider.base_url);

        let bundle = client.fetch_by_zipcode(&Zipcode::parse("10001").unwrap()).await;
        assert_eq!(bundle, ForecastBundle::empty());
    }

    #[tokio::test]
    async fn test_malformed_body_gives_empty_bundle() {
        let provider =
            StubProvider::spawn(vec![("/10001,US", StatusCode::OK, "<html>oops</html>")]).await;
        let client = client_for(&provider.base_url);

        let bundle = client.fetch_by_zipcode(&Zipcode::parse("10001").unwrap()).await;
        assert!(bundle.is_empty());
        assert!(bundle.current_condition.is_none());
        assert!(bundle.area_name.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_gives_empty_bundle() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = client_for("http://127.0.0.1:9");
        let bundle = client.fetch_by_zipcode(&Zipcode::parse("10001").unwrap()).await;
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn test_current_temperature() {
        let provider = StubProvider::spawn(vec![("/10001,US", StatusCode::OK, THREE_DAY_BODY)]).await;
        let client = client_for(&provider.base_url);

        let zipcode = Zipcode::parse("10001").unwrap();
        assert_eq!(client.fetch_current_temperature(&zipcode).await, "72");

        let unknown = Zipcode::parse("99999").unwrap();
        assert_eq!(client.fetch_current_temperature(&unknown).await, "");
    }
}
