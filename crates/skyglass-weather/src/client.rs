//! Thin JSON-over-HTTP wrapper.
//!
//! One attempt per call: no retries, no backoff. Callers decide how a
//! failure is surfaced.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skyglass_core::{NetworkError, ReqwestErrorExt};
use tracing::instrument;

const USER_AGENT: &str = concat!("Skyglass/", env!("CARGO_PKG_VERSION"));

/// Error body the weather provider sends alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_network_error())?;

        Ok(Self { client })
    }

    /// GET `url` with `query` and parse the body as JSON.
    ///
    /// Query values are not logged; they carry the API key.
    #[instrument(skip(self, query), level = "debug")]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, NetworkError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            tracing::debug!("Request returned status {}: {}", status, message);
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("q", "hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .mount(&server)
            .await;

        let value = client()
            .get_json::<serde_json::Value>(&format!("{}/ping", server.uri()), &[("q", "hello".to_string())])
            .await
            .unwrap();

        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_error_status_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<serde_json::Value>(&format!("{}/missing", server.uri()), &[])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            NetworkError::ServerError {
                status: 404,
                message: "city not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_error_status_without_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<serde_json::Value>(&format!("{}/anything", server.uri()), &[])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<serde_json::Value>(&format!("{}/broken", server.uri()), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, NetworkError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on port 9 locally
        let err = client()
            .get_json::<serde_json::Value>("http://127.0.0.1:9/unreachable", &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NetworkError::ConnectionFailed(_) | NetworkError::Timeout
        ));
    }
}
