use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable that overrides `weather.api_key`.
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the preference store)
    pub config_dir: PathBuf,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Geolocation settings
    #[serde(default)]
    pub location: LocationConfig,
}

/// Measurement system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    #[default]
    Metric,
    Imperial,
}

impl UnitPreference {
    /// Value of the provider's `units` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    /// The other unit.
    pub fn toggled(self) -> Self {
        match self {
            Self::Metric => Self::Imperial,
            Self::Imperial => Self::Metric,
        }
    }

    pub fn temperature_symbol(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn speed_symbol(self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

impl std::str::FromStr for UnitPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" | "celsius" | "c" => Ok(Self::Metric),
            "imperial" | "fahrenheit" | "f" => Ok(Self::Imperial),
            other => Err(format!("unknown unit preference: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (overridden by `OPENWEATHERMAP_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider base URL
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Unit used until the user picks one
    #[serde(default)]
    pub default_unit: UnitPreference,
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_secs: default_timeout_secs(),
            default_unit: UnitPreference::Metric,
        }
    }
}

impl WeatherConfig {
    /// Resolve the API key: environment variable first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

/// How the startup location is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Use the configured latitude/longitude
    Fixed,
    /// Look the location up from the public IP address
    #[default]
    Ip,
    /// The user refused location access
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub mode: LocationMode,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// JSON endpoint answering `{ "status", "lat", "lon" }`
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Upper bound on a single geolocation attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            mode: LocationMode::Ip,
            latitude: None,
            longitude: None,
            ip_lookup_url: default_ip_lookup_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyglass");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults there if absent.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| ConfigError::ReadFailed(format!("{}: {}", config_path.display(), e)))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", config_path.display(), e)))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if self.weather.resolve_api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!("No API key configured; set {} or weather.api_key", API_KEY_ENV),
            );
        }

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        } else if self.weather.timeout_secs > 120 {
            result.add_warning("weather.timeout_secs", "Timeout is unusually long (>120s)");
        }

        if self.location.timeout_secs == 0 {
            result.add_error("location.timeout_secs", "Timeout must be greater than 0");
        }

        match self.location.mode {
            LocationMode::Fixed => match (self.location.latitude, self.location.longitude) {
                (Some(lat), Some(lon)) => {
                    if !(-90.0..=90.0).contains(&lat) {
                        result.add_error("location.latitude", "Latitude must be within -90..=90");
                    }
                    if !(-180.0..=180.0).contains(&lon) {
                        result.add_error(
                            "location.longitude",
                            "Longitude must be within -180..=180",
                        );
                    }
                }
                _ => result.add_error(
                    "location",
                    "Fixed location mode needs both latitude and longitude",
                ),
            },
            LocationMode::Ip => {
                self.validate_url(
                    &self.location.ip_lookup_url,
                    "location.ip_lookup_url",
                    &mut result,
                );
            }
            LocationMode::Disabled => {}
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::WriteFailed(e.to_string()))?;

        std::fs::write(config_path, contents)
            .map_err(|e| ConfigError::WriteFailed(format!("{}: {}", config_path.display(), e)))
    }

    /// Path of the JSON preference store inside the config directory
    pub fn store_path(&self) -> PathBuf {
        self.config_dir.join("store.json")
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no platform config directory".to_string()))?
            .join("skyglass");

        Ok(config_dir.join("config.toml"))
    }
}
