//! Weather alerts and outdoor recommendations derived from current conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::derive::{heat_index, to_celsius, to_metres_per_second, wind_chill};
use crate::types::{CurrentConditions, WeatherCondition};

const EXTREME_HEAT_INDEX: f64 = 40.0;
const EXTREME_COLD_CHILL: f64 = 0.0;
/// m/s
const RAIN_WIND_LIMIT: f64 = 10.0;
/// m/s
const HIGH_WIND_LIMIT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExtremeHeat,
    ExtremeCold,
    Thunderstorm,
    HeavyRainAndWind,
    Rain,
    HighWind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Night,
}

impl DayPeriod {
    /// Night runs 18:00 to 06:00, afternoon 12:00 to 18:00.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            h if h >= 18 || h < 6 => Self::Night,
            12..=17 => Self::Afternoon,
            _ => Self::Morning,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub period: DayPeriod,
    pub message: String,
    /// In the observation's unit
    pub feels_like: f64,
    pub wind_direction: Option<&'static str>,
}

/// Observation values in Celsius and m/s.
struct MetricReading {
    temp: f64,
    humidity: f64,
    wind: f64,
    chill: f64,
    heat: f64,
    condition: WeatherCondition,
}

impl MetricReading {
    fn from(current: &CurrentConditions) -> Self {
        let temp = to_celsius(current.temperature, current.unit);
        let humidity = f64::from(current.humidity);
        let wind = to_metres_per_second(current.wind_speed, current.unit);
        Self {
            temp,
            humidity,
            wind,
            chill: wind_chill(temp, wind),
            heat: heat_index(temp, humidity),
            condition: current.condition.group,
        }
    }
}

fn frostbite_risk(chill: f64) -> Option<&'static str> {
    if chill > -15.0 {
        None
    } else if chill > -28.0 {
        Some("Risk of frostbite in 30 minutes")
    } else if chill > -35.0 {
        Some("Risk of frostbite in 10 minutes")
    } else {
        Some("Risk of frostbite in 5 minutes")
    }
}

fn summary(current: &CurrentConditions) -> String {
    format!(
        "Temp: {:.1}{} | Humidity: {}% | Wind: {:.1} {}",
        current.temperature,
        current.unit.temperature_symbol(),
        current.humidity,
        current.wind_speed,
        current.unit.speed_symbol()
    )
}

/// The most urgent alert for `current`, if any.
pub fn evaluate_alert(current: &CurrentConditions) -> Option<Alert> {
    let reading = MetricReading::from(current);
    let info = summary(current);

    let alert = |kind, severity, message: &str, details: String| Alert {
        kind,
        severity,
        message: message.to_string(),
        details,
    };

    if reading.heat >= EXTREME_HEAT_INDEX {
        return Some(alert(
            AlertKind::ExtremeHeat,
            Severity::Severe,
            "Extreme Heat Alert!",
            format!(
                "Heat Index: {:.1}°C. Stay hydrated and avoid outdoor activities. {}",
                reading.heat, info
            ),
        ));
    }

    if reading.chill <= EXTREME_COLD_CHILL {
        let risk = frostbite_risk(reading.chill)
            .map(|r| format!("{}; ", r))
            .unwrap_or_default();
        return Some(alert(
            AlertKind::ExtremeCold,
            Severity::Severe,
            "Extreme Cold Alert!",
            format!(
                "Wind Chill: {:.1}°C. {}bundle up and limit exposure. {}",
                reading.chill, risk, info
            ),
        ));
    }

    match reading.condition {
        WeatherCondition::Thunderstorm => Some(alert(
            AlertKind::Thunderstorm,
            Severity::Severe,
            "Severe Thunderstorm Alert!",
            format!("Stay indoors and avoid open areas. {}", info),
        )),
        c if c.is_rain() && reading.wind > RAIN_WIND_LIMIT => Some(alert(
            AlertKind::HeavyRainAndWind,
            Severity::Moderate,
            "Heavy Rain and Wind Alert!",
            format!("Stay indoors and secure loose objects. {}", info),
        )),
        c if c.is_rain() => Some(alert(
            AlertKind::Rain,
            Severity::Moderate,
            "Rain Alert!",
            format!(
                "Light to moderate rain expected. Consider indoor activities. {}",
                info
            ),
        )),
        _ if reading.wind > HIGH_WIND_LIMIT => Some(alert(
            AlertKind::HighWind,
            Severity::Moderate,
            "High Wind Alert!",
            format!("Secure outdoor objects and avoid travel. {}", info),
        )),
        _ => None,
    }
}

/// A suggestion for the local time of day. Nothing is suggested while an
/// alert condition holds.
pub fn recommend(current: &CurrentConditions, now: DateTime<Utc>) -> Option<Recommendation> {
    if evaluate_alert(current).is_some() {
        return None;
    }

    let reading = MetricReading::from(current);
    let period = DayPeriod::from_hour(current.local_hour_at(now));
    let temp = reading.temp;
    let pleasant_range = temp > 20.0 && temp < 30.0;

    let message = match period {
        DayPeriod::Night if pleasant_range && reading.wind < 5.0 => {
            "It's a peaceful night. Perfect for a walk under the moonlight!"
        }
        DayPeriod::Night if temp < 15.0 => {
            "It's a cool night. A light jacket would be perfect for a stroll!"
        }
        DayPeriod::Night => "It's a pleasant night. Enjoy a relaxing evening outdoors!",
        DayPeriod::Afternoon if temp > 25.0 && reading.humidity < 60.0 => {
            "It's a pleasant afternoon. Great time for outdoor activities!"
        }
        DayPeriod::Afternoon if reading.humidity > 80.0 => {
            "It's a humid afternoon. Stay hydrated if you're heading out!"
        }
        DayPeriod::Afternoon => "It's a nice afternoon. Enjoy some time outdoors!",
        DayPeriod::Morning if pleasant_range && reading.condition == WeatherCondition::Clear => {
            "It's a beautiful morning. Start your day with a refreshing walk!"
        }
        DayPeriod::Morning if temp < 20.0 => "It's a cool morning. A brisk walk will warm you up!",
        DayPeriod::Morning => "It's a pleasant morning. Enjoy the fresh air!",
    };

    Some(Recommendation {
        period,
        message: format!("{} {}", message, summary(current)),
        feels_like: current.feels_like,
        wind_direction: current.wind_cardinal(),
    })
}
