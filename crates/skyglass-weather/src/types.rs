use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use skyglass_core::WeatherError;

pub use skyglass_core::UnitPreference;

/// Two coordinate pairs closer than this (in degrees) name the same place.
const SAME_PLACE_EPSILON: f64 = 1e-4;

/// Geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both pairs refer to the same location, ignoring provider rounding.
    pub fn same_place(&self, other: &Coordinates) -> bool {
        (self.latitude - other.latitude).abs() < SAME_PLACE_EPSILON
            && (self.longitude - other.longitude).abs() < SAME_PLACE_EPSILON
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}, {:.2}", self.latitude, self.longitude)
    }
}

/// Weather condition groups mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    Mist,
    Smoke,
    Haze,
    Dust,
    Fog,
    Sand,
    Ash,
    Squall,
    Tornado,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: i32) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            701 => Self::Mist,
            711 => Self::Smoke,
            721 => Self::Haze,
            731 | 761 => Self::Dust,
            741 => Self::Fog,
            751 => Self::Sand,
            762 => Self::Ash,
            771 => Self::Squall,
            781 => Self::Tornado,
            801..=809 => Self::Clouds,
            _ => Self::Clear, // 800 and unknown codes
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Mist => "Mist",
            Self::Smoke => "Smoke",
            Self::Haze => "Haze",
            Self::Dust => "Dust",
            Self::Fog => "Fog",
            Self::Sand => "Sand",
            Self::Ash => "Ash",
            Self::Squall => "Squall",
            Self::Tornado => "Tornado",
        }
    }

    /// Precipitation that the alert rules treat as rain
    pub fn is_rain(&self) -> bool {
        matches!(self, Self::Rain)
    }
}

/// Primary condition reported for an observation or forecast sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i32,
    pub group: WeatherCondition,
    pub description: String,
    /// Provider icon code, e.g. `01d`
    pub icon: String,
}

impl Condition {
    /// Provider description, or the group name when the provider sent none.
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() {
            self.group.description()
        } else {
            &self.description
        }
    }
}

/// Current weather conditions at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub coordinates: Coordinates,
    pub place_name: String,
    pub country: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    /// Metres
    pub visibility: Option<u32>,
    /// m/s for metric, mph for imperial
    pub wind_speed: f64,
    /// Degrees, meteorological
    pub wind_direction: Option<u16>,
    pub condition: Condition,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    /// Seconds east of UTC
    pub timezone_offset: i32,
    pub unit: UnitPreference,
}

impl CurrentConditions {
    /// True when `now` falls between the location's sunrise and sunset.
    pub fn is_daytime_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.sunrise && now < self.sunset
    }

    /// Day/night at the moment of observation.
    pub fn is_daytime(&self) -> bool {
        self.is_daytime_at(self.observed_at)
    }

    /// Wall-clock time at the location.
    pub fn local_time_at(&self, now: DateTime<Utc>) -> NaiveDateTime {
        (now + Duration::seconds(i64::from(self.timezone_offset))).naive_utc()
    }

    /// Hour of day (0..24) at the location.
    pub fn local_hour_at(&self, now: DateTime<Utc>) -> u32 {
        self.local_time_at(now).hour()
    }

    /// Cardinal wind direction (N, NE, ... NW)
    pub fn wind_cardinal(&self) -> Option<&'static str> {
        self.wind_direction.map(crate::derive::cardinal_direction)
    }

    /// Dew point in the observation's unit.
    pub fn dew_point(&self) -> Option<f64> {
        let celsius = crate::derive::to_celsius(self.temperature, self.unit);
        crate::derive::dew_point(celsius, f64::from(self.humidity))
            .map(|dew| crate::derive::from_celsius(dew, self.unit))
    }

    /// "Name, CC" or the coordinates when the provider has no name for the spot.
    pub fn display_name(&self) -> String {
        match (&self.place_name, &self.country) {
            (name, _) if name.is_empty() => self.coordinates.to_string(),
            (name, Some(country)) if !country.is_empty() => format!("{}, {}", name, country),
            (name, _) => name.clone(),
        }
    }
}

/// One 3-hour forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub condition: Condition,
    /// Probability of precipitation, 0.0..=1.0
    pub precipitation_chance: f64,
}

impl ForecastSample {
    /// Probability of precipitation as a whole percentage
    pub fn precipitation_percent(&self) -> u8 {
        (self.precipitation_chance.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Samples per day at the provider's 3-hour resolution
pub const SAMPLES_PER_DAY: usize = 8;

/// Forecast fetched for one coordinate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub coordinates: Coordinates,
    pub unit: UnitPreference,
    pub samples: Vec<ForecastSample>,
}

impl ForecastSeries {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// One sample per day, starting with the first.
    pub fn daily(&self) -> Vec<&ForecastSample> {
        self.samples.iter().step_by(SAMPLES_PER_DAY).collect()
    }

    /// The next `count` samples.
    pub fn next_hours(&self, count: usize) -> &[ForecastSample] {
        &self.samples[..count.min(self.samples.len())]
    }
}

/// Air quality band reported by the provider (index 1..=5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AqiLevel {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Good),
            2 => Some(Self::Fair),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::VeryPoor),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

/// Pollutant concentrations in μg/m³
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pollutants {
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
}

/// Air quality at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySample {
    pub coordinates: Coordinates,
    pub measured_at: DateTime<Utc>,
    pub index: u8,
    pub components: Pollutants,
}

impl AirQualitySample {
    pub fn level(&self) -> Option<AqiLevel> {
        AqiLevel::from_index(self.index)
    }
}

/// Saved city shown in the favorites strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteCity {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Temperature when the favorite was saved
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub unit: Option<UnitPreference>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

impl FavoriteCity {
    /// Entry carrying only a name (legacy storage kept nothing else).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: None,
            temperature: None,
            unit: None,
            icon: None,
            condition: None,
        }
    }

    /// Snapshot of the given conditions.
    pub fn from_conditions(current: &CurrentConditions) -> Self {
        let name = if current.place_name.is_empty() {
            current.coordinates.to_string()
        } else {
            current.place_name.clone()
        };
        Self {
            name,
            country: current.country.clone(),
            temperature: Some(current.temperature),
            unit: Some(current.unit),
            icon: Some(current.condition.icon.clone()),
            condition: Some(current.condition.description.clone()),
        }
    }
}

/// Geolocation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    #[error("Geolocation is not supported in this environment")]
    Unsupported,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location unavailable: {0}")]
    Unavailable(String),
    #[error("Location request timed out")]
    Timeout,
}

impl From<GeoError> for WeatherError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::Unsupported => WeatherError::GeolocationUnsupported,
            GeoError::PermissionDenied => WeatherError::GeolocationDenied,
            GeoError::Unavailable(reason) => WeatherError::GeolocationUnavailable(reason),
            GeoError::Timeout => {
                WeatherError::GeolocationUnavailable("request timed out".to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn condition(id: i32, description: &str, icon: &str) -> Condition {
        Condition {
            id,
            group: WeatherCondition::from_owm_id(id),
            description: description.to_string(),
            icon: icon.to_string(),
        }
    }

    /// Metric conditions in London at 12:00 UTC with sunrise 07:00 and sunset 17:00.
    pub fn london() -> CurrentConditions {
        let noon = DateTime::from_timestamp(1_700_049_600, 0).unwrap_or_default();
        CurrentConditions {
            coordinates: Coordinates::new(51.5085, -0.1257),
            place_name: "London".to_string(),
            country: Some("GB".to_string()),
            observed_at: noon,
            temperature: 15.0,
            feels_like: 14.2,
            humidity: 70,
            pressure: 1012,
            visibility: Some(10_000),
            wind_speed: 3.0,
            wind_direction: Some(225),
            condition: condition(800, "clear sky", "01d"),
            sunrise: noon - Duration::hours(5),
            sunset: noon + Duration::hours(5),
            timezone_offset: 0,
            unit: UnitPreference::Metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::london;
    use super::*;

    #[test]
    fn test_owm_id_groups() {
        assert_eq!(WeatherCondition::from_owm_id(211), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_owm_id(301), WeatherCondition::Drizzle);
        assert_eq!(WeatherCondition::from_owm_id(502), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_id(601), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_owm_id(741), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_owm_id(761), WeatherCondition::Dust);
        assert_eq!(WeatherCondition::from_owm_id(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(804), WeatherCondition::Clouds);
    }

    #[test]
    fn test_condition_label_falls_back_to_group() {
        assert_eq!(fixtures::condition(500, "light rain", "10d").label(), "light rain");
        assert_eq!(fixtures::condition(500, " ", "10d").label(), "Rain");
    }

    #[test]
    fn test_unknown_id_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_owm_id(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_same_place_tolerates_rounding() {
        let precise = Coordinates::new(51.50853, -0.12574);
        let rounded = Coordinates::new(51.5085, -0.1257);
        assert!(precise.same_place(&rounded));
        assert!(!precise.same_place(&Coordinates::new(48.8566, 2.3522)));
    }

    #[test]
    fn test_dew_point_follows_unit() {
        let metric = london();
        let dew_c = metric.dew_point().unwrap();
        assert!((dew_c - 9.6).abs() < 0.1, "got {dew_c}");

        let mut imperial = london();
        imperial.temperature = 59.0;
        imperial.unit = UnitPreference::Imperial;
        let dew_f = imperial.dew_point().unwrap();
        assert!((dew_f - (dew_c * 1.8 + 32.0)).abs() < 1e-6, "got {dew_f}");
    }

    #[test]
    fn test_daytime_window() {
        let current = london();
        assert!(current.is_daytime());
        assert!(current.is_daytime_at(current.sunrise));
        assert!(!current.is_daytime_at(current.sunset));
        assert!(!current.is_daytime_at(current.sunrise - Duration::minutes(1)));
    }

    #[test]
    fn test_local_hour_uses_timezone_offset() {
        let mut current = london();
        assert_eq!(current.local_hour_at(current.observed_at), 12);
        current.timezone_offset = 5 * 3600 + 1800;
        assert_eq!(current.local_hour_at(current.observed_at), 17);
        current.timezone_offset = -8 * 3600;
        assert_eq!(current.local_hour_at(current.observed_at), 4);
    }

    #[test]
    fn test_display_name_falls_back_to_coordinates() {
        let mut current = london();
        assert_eq!(current.display_name(), "London, GB");
        current.place_name.clear();
        assert_eq!(current.display_name(), "51.51, -0.13");
    }

    #[test]
    fn test_daily_and_next_hours() {
        let base = london();
        let samples = (0..40)
            .map(|i| ForecastSample {
                time: base.observed_at + Duration::hours(3 * i),
                temperature: i as f64,
                condition: base.condition.clone(),
                precipitation_chance: 0.25,
            })
            .collect();
        let series = ForecastSeries {
            coordinates: base.coordinates,
            unit: UnitPreference::Metric,
            samples,
        };

        let daily: Vec<f64> = series.daily().iter().map(|s| s.temperature).collect();
        assert_eq!(daily, vec![0.0, 8.0, 16.0, 24.0, 32.0]);
        assert_eq!(series.next_hours(3).len(), 3);
        assert_eq!(series.next_hours(100).len(), 40);
        assert_eq!(series.samples[0].precipitation_percent(), 25);
    }

    #[test]
    fn test_aqi_levels() {
        assert_eq!(AqiLevel::from_index(1), Some(AqiLevel::Good));
        assert_eq!(AqiLevel::from_index(5).map(|l| l.label()), Some("Very Poor"));
        assert_eq!(AqiLevel::from_index(0), None);
    }

    #[test]
    fn test_favorite_from_conditions() {
        let favorite = FavoriteCity::from_conditions(&london());
        assert_eq!(favorite.name, "London");
        assert_eq!(favorite.temperature, Some(15.0));
        assert_eq!(favorite.icon.as_deref(), Some("01d"));
        assert_eq!(favorite.condition.as_deref(), Some("clear sky"));
    }

    #[test]
    fn test_geo_error_maps_to_weather_error() {
        assert_eq!(
            WeatherError::from(GeoError::PermissionDenied),
            WeatherError::GeolocationDenied
        );
        assert_eq!(
            WeatherError::from(GeoError::Unsupported),
            WeatherError::GeolocationUnsupported
        );
        assert!(matches!(
            WeatherError::from(GeoError::Timeout),
            WeatherError::GeolocationUnavailable(_)
        ));
    }
}
