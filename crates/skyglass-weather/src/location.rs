//! Geolocation providers.
//!
//! A provider answers "where is the user" exactly once per call. Which
//! provider runs is a configuration choice; the service only sees the trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use skyglass_core::{LocationConfig, LocationMode, NetworkError};

use crate::client::HttpClient;
use crate::types::{Coordinates, GeoError};

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Resolve the device position.
    async fn current_coordinates(&self) -> Result<Coordinates, GeoError>;
}

/// Run `provider` with an upper bound on how long it may take.
pub async fn locate_with_timeout(
    provider: &dyn GeolocationProvider,
    timeout: Duration,
) -> Result<Coordinates, GeoError> {
    match tokio::time::timeout(timeout, provider.current_coordinates()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Geolocation did not answer within {:?}", timeout);
            Err(GeoError::Timeout)
        }
    }
}

/// Always answers with the configured coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinates: Coordinates,
}

impl FixedLocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl GeolocationProvider for FixedLocation {
    async fn current_coordinates(&self) -> Result<Coordinates, GeoError> {
        Ok(self.coordinates)
    }
}

/// The user refused location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLocation;

#[async_trait]
impl GeolocationProvider for DisabledLocation {
    async fn current_coordinates(&self) -> Result<Coordinates, GeoError> {
        Err(GeoError::PermissionDenied)
    }
}

/// No location capability at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLocation;

#[async_trait]
impl GeolocationProvider for UnsupportedLocation {
    async fn current_coordinates(&self) -> Result<Coordinates, GeoError> {
        Err(GeoError::Unsupported)
    }
}

/// ip-api.com style response
#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocation {
    client: HttpClient,
    url: String,
}

impl IpGeolocation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NetworkError> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl GeolocationProvider for IpGeolocation {
    async fn current_coordinates(&self) -> Result<Coordinates, GeoError> {
        let response: IpLookupResponse = self
            .client
            .get_json(&self.url, &[])
            .await
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;

        if response.status != "success" {
            let reason = response
                .message
                .unwrap_or_else(|| format!("lookup status {}", response.status));
            return Err(GeoError::Unavailable(reason));
        }

        match (response.lat, response.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(GeoError::Unavailable("lookup returned no position".into())),
        }
    }
}

/// Build the provider selected in the configuration.
pub fn from_config(config: &LocationConfig) -> Arc<dyn GeolocationProvider> {
    match config.mode {
        LocationMode::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Arc::new(FixedLocation::new(Coordinates::new(lat, lon))),
            _ => {
                tracing::warn!("Fixed location mode without coordinates; geolocation unavailable");
                Arc::new(UnsupportedLocation)
            }
        },
        LocationMode::Ip => {
            match IpGeolocation::new(
                config.ip_lookup_url.clone(),
                Duration::from_secs(config.timeout_secs),
            ) {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    tracing::warn!("Failed to build IP geolocation client: {}", e);
                    Arc::new(UnsupportedLocation)
                }
            }
        }
        LocationMode::Disabled => Arc::new(DisabledLocation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NeverAnswers;

    #[async_trait]
    impl GeolocationProvider for NeverAnswers {
        async fn current_coordinates(&self) -> Result<Coordinates, GeoError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let at = Coordinates::new(45.4215, -75.6972);
        let provider = FixedLocation::new(at);
        assert_eq!(provider.current_coordinates().await, Ok(at));
    }

    #[tokio::test]
    async fn test_disabled_and_unsupported() {
        assert_eq!(
            DisabledLocation.current_coordinates().await,
            Err(GeoError::PermissionDenied)
        );
        assert_eq!(
            UnsupportedLocation.current_coordinates().await,
            Err(GeoError::Unsupported)
        );
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let result = locate_with_timeout(&NeverAnswers, Duration::from_millis(20)).await;
        assert_eq!(result, Err(GeoError::Timeout));
    }

    #[tokio::test]
    async fn test_ip_lookup_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success", "lat": 48.8566, "lon": 2.3522, "city": "Paris"
            })))
            .mount(&server)
            .await;

        let provider = IpGeolocation::new(server.uri(), Duration::from_secs(5)).unwrap();
        let at = provider.current_coordinates().await.unwrap();
        assert_eq!(at, Coordinates::new(48.8566, 2.3522));
    }

    #[tokio::test]
    async fn test_ip_lookup_fail_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail", "message": "private range"
            })))
            .mount(&server)
            .await;

        let provider = IpGeolocation::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            provider.current_coordinates().await,
            Err(GeoError::Unavailable("private range".into()))
        );
    }

    #[tokio::test]
    async fn test_ip_lookup_http_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = IpGeolocation::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            provider.current_coordinates().await,
            Err(GeoError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_from_config_modes() {
        let mut config = LocationConfig {
            mode: LocationMode::Disabled,
            ..LocationConfig::default()
        };
        assert_eq!(
            from_config(&config).current_coordinates().await,
            Err(GeoError::PermissionDenied)
        );

        config.mode = LocationMode::Fixed;
        assert_eq!(
            from_config(&config).current_coordinates().await,
            Err(GeoError::Unsupported)
        );

        config.latitude = Some(1.0);
        config.longitude = Some(2.0);
        assert_eq!(
            from_config(&config).current_coordinates().await,
            Ok(Coordinates::new(1.0, 2.0))
        );
    }
}
