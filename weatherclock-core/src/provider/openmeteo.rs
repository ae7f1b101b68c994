use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::model::Location;

use super::{FetchOutcome, ForecastSource};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Two days, so a late-evening lookup still fills a six-hour window.
const FORECAST_DAYS: &str = "2";
const HOURLY_VARIABLES: &str = "temperature_2m,weathercode";

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new() -> reqwest::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Full request URL for `location`.
    pub fn forecast_url(&self, location: &Location) -> String {
        let (latitude, longitude) = location.request_coordinates();
        format!(
            "{}/v1/forecast?latitude={latitude}&longitude={longitude}&hourly={HOURLY_VARIABLES}&forecast_days={FORECAST_DAYS}&timezone=auto",
            self.base_url
        )
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoProvider {
    async fn fetch(&self, location: &Location) -> FetchOutcome {
        let url = self.forecast_url(location);
        tracing::debug!(%url, "Fetching forecast");

        let res = match self.http.get(&url).send().await {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!("Weather fetch error: {err}");
                return FetchOutcome::TransportError(err.to_string());
            }
        };

        // Open-Meteo reports bad requests as a JSON body; let the parser see it.
        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%status, "Forecast request returned non-success status");
        }

        match res.bytes().await {
            Ok(body) => {
                let outcome = FetchOutcome::from_body(&body);
                if let Some(reason) = outcome.failure_reason() {
                    tracing::warn!("{reason}");
                }
                outcome
            }
            Err(err) => {
                tracing::warn!("Failed to read forecast response body: {err}");
                FetchOutcome::TransportError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn url_requests_two_days_with_auto_timezone() {
        let provider = OpenMeteoProvider::with_base_url("https://example.test/").unwrap();
        let url = provider.forecast_url(&Location::new("52.52", "13.41"));

        assert_eq!(
            url,
            "https://example.test/v1/forecast?latitude=52.52&longitude=13.41\
             &hourly=temperature_2m,weathercode&forecast_days=2&timezone=auto"
        );
    }

    #[test]
    fn url_never_embeds_malformed_coordinates() {
        let provider = OpenMeteoProvider::new().unwrap();
        let url = provider.forecast_url(&Location::new("1&x=2", "13.41"));

        assert!(url.starts_with(DEFAULT_BASE_URL));
        assert!(url.contains("latitude=43.640&longitude=-79.565"));
    }

    #[tokio::test]
    async fn fetch_returns_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.52"))
            .and(query_param("forecast_days", "2"))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hourly":{}}"#))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri()).unwrap();
        let outcome = provider.fetch(&Location::new("52.52", "13.41")).await;

        assert_eq!(outcome, FetchOutcome::Success(r#"{"hourly":{}}"#.to_string()));
    }

    #[tokio::test]
    async fn error_status_body_is_passed_through() {
        let server = MockServer::start().await;
        let body = r#"{"error":true,"reason":"Latitude must be in range of -90 to 90°."}"#;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(400).set_body_string(body))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri()).unwrap();
        let outcome = provider.fetch(&Location::new("95", "13.41")).await;

        assert_eq!(outcome, FetchOutcome::Success(body.to_string()));
    }

    #[tokio::test]
    async fn empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri()).unwrap();
        let outcome = provider.fetch(&Location::default()).await;

        assert_eq!(outcome, FetchOutcome::EmptyBody);
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider = OpenMeteoProvider::with_base_url(format!("http://127.0.0.1:{port}")).unwrap();
        let outcome = provider.fetch(&Location::default()).await;

        assert!(matches!(outcome, FetchOutcome::TransportError(_)));
    }
}
