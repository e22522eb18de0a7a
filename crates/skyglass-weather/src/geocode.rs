//! Reverse geocoding: name the place at a coordinate pair.
//! Uses the weather provider's `/geo/1.0/reverse` endpoint.

use crate::provider::{PlaceName, WeatherProvider};
use crate::types::{Coordinates, CurrentConditions};

/// Best match for `at`. Returns `None` on any failure; the caller keeps the
/// coordinates as the label.
pub async fn reverse_geocode(provider: &WeatherProvider, at: Coordinates) -> Option<PlaceName> {
    match provider.reverse_lookup(at).await {
        Ok(places) => {
            let place = places.into_iter().find(|p| !p.name.trim().is_empty());
            if place.is_none() {
                tracing::debug!("Reverse geocode found no place near {}", at);
            }
            place
        }
        Err(e) => {
            tracing::debug!("Reverse geocode failed for {}: {}", at, e);
            None
        }
    }
}

/// Fill an empty place name on `current` from a reverse lookup.
pub async fn fill_place_name(provider: &WeatherProvider, current: &mut CurrentConditions) {
    if !current.place_name.trim().is_empty() {
        return;
    }

    if let Some(place) = reverse_geocode(provider, current.coordinates).await {
        current.place_name = place.name;
        if current.country.is_none() {
            current.country = place.country;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::london;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> WeatherProvider {
        WeatherProvider::new(server.uri(), "key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fills_missing_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "Westminster", "country": "GB", "state": "England",
                  "lat": 51.5, "lon": -0.12 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut current = london();
        current.place_name.clear();
        current.country = None;
        fill_place_name(&provider(&server), &mut current).await;

        assert_eq!(current.place_name, "Westminster");
        assert_eq!(current.country.as_deref(), Some("GB"));
    }

    #[tokio::test]
    async fn test_existing_name_skips_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let mut current = london();
        fill_place_name(&provider(&server), &mut current).await;
        assert_eq!(current.place_name, "London");
    }

    #[tokio::test]
    async fn test_failure_keeps_coordinates_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut current = london();
        current.place_name.clear();
        fill_place_name(&provider(&server), &mut current).await;

        assert!(current.place_name.is_empty());
        assert_eq!(current.display_name(), "51.51, -0.13");
    }

    #[tokio::test]
    async fn test_empty_result_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let place = reverse_geocode(&provider(&server), Coordinates::new(0.0, -30.0)).await;
        assert_eq!(place, None);
    }
}
