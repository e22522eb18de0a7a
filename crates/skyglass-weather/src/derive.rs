//! Values computed from an observation rather than fetched.
//!
//! Threshold rules work in metric units: temperatures in Celsius and wind
//! speeds in m/s. Use [`to_celsius`] and [`to_metres_per_second`] to bring
//! imperial observations into that frame first.

use crate::types::UnitPreference;

const CARDINALS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Wind chill in Celsius.
/// Environment Canada / NWS metric formula, valid at or below 10 °C with
/// wind above 4.8 km/h. Outside that range the air temperature is returned.
///
/// # Arguments
///
/// * 'temp' - temperature in Celsius
/// * 'wind_speed' - wind speed in m/s
pub fn wind_chill(temp: f64, wind_speed: f64) -> f64 {
    let kmh = wind_speed * 3.6;
    if temp > 10.0 || kmh <= 4.8 {
        return temp;
    }
    let v = kmh.powf(0.16);
    13.12 + 0.6215 * temp - 11.37 * v + 0.3965 * temp * v
}

/// Heat index in Celsius.
/// Australian apparent-temperature approximation without the wind term,
/// applied from 27 °C; below that the air temperature is returned.
///
/// # Arguments
///
/// * 'temp' - temperature in Celsius
/// * 'humidity' - relative humidity in percent
pub fn heat_index(temp: f64, humidity: f64) -> f64 {
    if temp < 27.0 {
        return temp;
    }
    temp + 0.33 * vapour_pressure(temp, humidity) - 4.25
}

/// Dew point in Celsius (Magnus formula). `None` for zero humidity, where
/// the formula has no finite value.
pub fn dew_point(temp: f64, humidity: f64) -> Option<f64> {
    if humidity <= 0.0 {
        return None;
    }
    let gamma = MAGNUS_A * temp / (MAGNUS_B + temp) + (humidity.min(100.0) / 100.0).ln();
    Some(MAGNUS_B * gamma / (MAGNUS_A - gamma))
}

/// Water vapour pressure in hPa.
fn vapour_pressure(temp: f64, humidity: f64) -> f64 {
    (humidity / 100.0) * 6.105 * (MAGNUS_A * temp / (MAGNUS_B + temp)).exp()
}

/// Convert a provider temperature to Celsius
pub fn to_celsius(temp: f64, unit: UnitPreference) -> f64 {
    match unit {
        UnitPreference::Metric => temp,
        UnitPreference::Imperial => (temp - 32.0) / 1.8,
    }
}

/// Convert a provider wind speed to m/s
pub fn to_metres_per_second(speed: f64, unit: UnitPreference) -> f64 {
    match unit {
        UnitPreference::Metric => speed,
        UnitPreference::Imperial => speed * 0.44704,
    }
}

/// Convert Celsius back to the provider unit
pub fn from_celsius(temp: f64, unit: UnitPreference) -> f64 {
    match unit {
        UnitPreference::Metric => temp,
        UnitPreference::Imperial => temp * 1.8 + 32.0,
    }
}

/// Eight-point compass name for a bearing in degrees.
pub fn cardinal_direction(degrees: u16) -> &'static str {
    let index = ((f64::from(degrees % 360) / 45.0).round() as usize) % CARDINALS.len();
    CARDINALS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wind_chill_only_applies_when_cold_and_windy() {
        assert_eq!(wind_chill(15.0, 10.0), 15.0);
        assert_eq!(wind_chill(-5.0, 1.0), -5.0);
        let chill = wind_chill(-5.0, 10.0);
        assert!(chill < -5.0);
        assert!((chill - (-13.7)).abs() < 0.2, "got {chill}");
    }

    #[test]
    fn test_heat_index_only_applies_when_hot() {
        assert_eq!(heat_index(20.0, 90.0), 20.0);
        let humid = heat_index(35.0, 80.0);
        let dry = heat_index(35.0, 20.0);
        assert!(humid > dry);
        assert!(humid >= 40.0, "got {humid}");
    }

    #[test]
    fn test_dew_point() {
        let dew = dew_point(20.0, 50.0).unwrap();
        assert!((dew - 9.25).abs() < 0.1, "got {dew}");
        // Saturated air: dew point equals the air temperature
        assert!((dew_point(12.0, 100.0).unwrap() - 12.0).abs() < 1e-9);
        assert!(dew_point(12.0, 30.0).unwrap() < dew_point(12.0, 60.0).unwrap());
        assert_eq!(dew_point(20.0, 0.0), None);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((to_celsius(68.0, UnitPreference::Imperial) - 20.0).abs() < 1e-9);
        assert_eq!(to_celsius(20.0, UnitPreference::Metric), 20.0);
        assert!((from_celsius(20.0, UnitPreference::Imperial) - 68.0).abs() < 1e-9);
        assert!((to_metres_per_second(10.0, UnitPreference::Imperial) - 4.4704).abs() < 1e-9);
    }

    #[test]
    fn test_cardinal_direction() {
        assert_eq!(cardinal_direction(0), "N");
        assert_eq!(cardinal_direction(22), "N");
        assert_eq!(cardinal_direction(23), "NE");
        assert_eq!(cardinal_direction(225), "SW");
        assert_eq!(cardinal_direction(350), "N");
        assert_eq!(cardinal_direction(720), "N");
    }
}
