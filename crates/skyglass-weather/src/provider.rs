//! OpenWeatherMap endpoints: current conditions, forecast, air quality and
//! reverse geocoding.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use skyglass_core::{NetworkError, WeatherConfig};

use crate::client::HttpClient;
use crate::types::{
    AirQualitySample, Condition, Coordinates, CurrentConditions, ForecastSample, ForecastSeries,
    Pollutants, UnitPreference, WeatherCondition,
};

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

impl WeatherProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, NetworkError> {
        let api_key = config.resolve_api_key().unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("No weather API key configured; requests will be rejected");
        }
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn coordinate_query(&self, at: Coordinates) -> Vec<(&'static str, String)> {
        vec![
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("appid", self.api_key.clone()),
        ]
    }

    /// Current conditions at known coordinates.
    pub async fn current_by_coordinates(
        &self,
        at: Coordinates,
        unit: UnitPreference,
    ) -> Result<CurrentConditions, NetworkError> {
        let mut query = self.coordinate_query(at);
        query.push(("units", unit.as_query().to_string()));

        let body: wire::CurrentResponse = self
            .client
            .get_json(&self.url("/data/2.5/weather"), &query)
            .await?;

        let mut current = body.into_current(unit)?;
        current.coordinates = at;
        Ok(current)
    }

    /// Current conditions for a place name; the response carries the
    /// resolved coordinates.
    pub async fn current_by_name(
        &self,
        place: &str,
        unit: UnitPreference,
    ) -> Result<CurrentConditions, NetworkError> {
        let query = [
            ("q", place.to_string()),
            ("appid", self.api_key.clone()),
            ("units", unit.as_query().to_string()),
        ];

        let body: wire::CurrentResponse = self
            .client
            .get_json(&self.url("/data/2.5/weather"), &query)
            .await?;

        body.into_current(unit)
    }

    /// 5-day forecast in 3-hour steps.
    pub async fn forecast(
        &self,
        at: Coordinates,
        unit: UnitPreference,
    ) -> Result<ForecastSeries, NetworkError> {
        let mut query = self.coordinate_query(at);
        query.push(("units", unit.as_query().to_string()));

        let body: wire::ForecastResponse = self
            .client
            .get_json(&self.url("/data/2.5/forecast"), &query)
            .await?;

        let samples = body
            .list
            .into_iter()
            .map(wire::ForecastEntry::into_sample)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ForecastSeries {
            coordinates: at,
            unit,
            samples,
        })
    }

    /// Latest air-quality sample.
    pub async fn air_quality(&self, at: Coordinates) -> Result<AirQualitySample, NetworkError> {
        let query = self.coordinate_query(at);

        let body: wire::AirPollutionResponse = self
            .client
            .get_json(&self.url("/data/2.5/air_pollution"), &query)
            .await?;

        let entry = body
            .list
            .into_iter()
            .next()
            .ok_or_else(|| NetworkError::InvalidResponse("air quality list is empty".into()))?;

        if !(1..=5).contains(&entry.main.aqi) {
            return Err(NetworkError::InvalidResponse(format!(
                "air quality index out of range: {}",
                entry.main.aqi
            )));
        }

        Ok(AirQualitySample {
            coordinates: at,
            measured_at: timestamp(entry.dt)?,
            index: entry.main.aqi,
            components: entry.components,
        })
    }

    /// Place names near the coordinates, best match first.
    pub async fn reverse_lookup(&self, at: Coordinates) -> Result<Vec<PlaceName>, NetworkError> {
        let mut query = self.coordinate_query(at);
        query.push(("limit", "1".to_string()));

        self.client
            .get_json(&self.url("/geo/1.0/reverse"), &query)
            .await
    }
}

/// Reverse-geocoding result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceName {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, NetworkError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| NetworkError::InvalidResponse(format!("timestamp out of range: {secs}")))
}

/// Provider JSON shapes. Only the fields this crate reads are declared.
mod wire {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub struct Coord {
        pub lat: f64,
        pub lon: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct ConditionEntry {
        pub id: i32,
        #[serde(default)]
        pub description: String,
        #[serde(default)]
        pub icon: String,
    }

    impl ConditionEntry {
        fn into_condition(self) -> Condition {
            Condition {
                id: self.id,
                group: WeatherCondition::from_owm_id(self.id),
                description: self.description,
                icon: self.icon,
            }
        }
    }

    fn primary_condition(entries: Vec<ConditionEntry>) -> Result<Condition, NetworkError> {
        entries
            .into_iter()
            .next()
            .map(ConditionEntry::into_condition)
            .ok_or_else(|| NetworkError::InvalidResponse("missing weather condition".into()))
    }

    #[derive(Debug, Deserialize)]
    pub struct MainBlock {
        pub temp: f64,
        pub feels_like: f64,
        pub humidity: u8,
        pub pressure: u32,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Wind {
        #[serde(default)]
        pub speed: f64,
        #[serde(default)]
        pub deg: Option<u16>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Sys {
        #[serde(default)]
        pub country: Option<String>,
        pub sunrise: i64,
        pub sunset: i64,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentResponse {
        pub coord: Coord,
        pub weather: Vec<ConditionEntry>,
        pub main: MainBlock,
        #[serde(default)]
        pub visibility: Option<u32>,
        #[serde(default)]
        pub wind: Wind,
        pub dt: i64,
        pub sys: Sys,
        #[serde(default)]
        pub timezone: i32,
        #[serde(default)]
        pub name: String,
    }

    impl CurrentResponse {
        pub fn into_current(self, unit: UnitPreference) -> Result<CurrentConditions, NetworkError> {
            Ok(CurrentConditions {
                coordinates: Coordinates::new(self.coord.lat, self.coord.lon),
                place_name: self.name,
                country: self.sys.country.filter(|c| !c.is_empty()),
                observed_at: timestamp(self.dt)?,
                temperature: self.main.temp,
                feels_like: self.main.feels_like,
                humidity: self.main.humidity,
                pressure: self.main.pressure,
                visibility: self.visibility,
                wind_speed: self.wind.speed,
                wind_direction: self.wind.deg,
                condition: primary_condition(self.weather)?,
                sunrise: timestamp(self.sys.sunrise)?,
                sunset: timestamp(self.sys.sunset)?,
                timezone_offset: self.timezone,
                unit,
            })
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastMain {
        pub temp: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastEntry {
        pub dt: i64,
        pub main: ForecastMain,
        pub weather: Vec<ConditionEntry>,
        #[serde(default)]
        pub pop: f64,
    }

    impl ForecastEntry {
        pub fn into_sample(self) -> Result<ForecastSample, NetworkError> {
            Ok(ForecastSample {
                time: timestamp(self.dt)?,
                temperature: self.main.temp,
                condition: primary_condition(self.weather)?,
                precipitation_chance: self.pop,
            })
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct ForecastResponse {
        pub list: Vec<ForecastEntry>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AqiMain {
        pub aqi: u8,
    }

    #[derive(Debug, Deserialize)]
    pub struct AirPollutionEntry {
        pub dt: i64,
        pub main: AqiMain,
        #[serde(default)]
        pub components: Pollutants,
    }

    #[derive(Debug, Deserialize)]
    pub struct AirPollutionResponse {
        pub list: Vec<AirPollutionEntry>,
    }
}
