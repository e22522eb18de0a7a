//! Centralized error types for Skyglass.
//!
//! This module provides a typed error hierarchy that:
//! - Separates mandatory-path failures from degraded, best-effort ones
//! - Provides short user-facing messages suitable for a status line
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("TLS/SSL error: {0}")]
    TlsError(String),
}

impl NetworkError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            NetworkError::TlsError(_) => "Secure connection failed. Check your network settings.",
        }
    }
}

/// Local storage errors (preferences file, schema migration).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read store: {0}")]
    ReadFailed(String),

    #[error("Failed to write store: {0}")]
    WriteFailed(String),

    #[error("Store data is corrupted: {0}")]
    Corruption(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::ReadFailed(_) => "Unable to read saved settings. Using defaults.",
            StorageError::WriteFailed(_) => "Unable to save settings. Changes may be lost.",
            StorageError::Corruption(_) => {
                "Saved settings look corrupted. Consider resetting app data."
            }
            StorageError::MigrationFailed(_) => {
                "Failed to update saved settings. Try restarting the app."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration: {0}")]
    ReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    WriteFailed(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "No configuration directory is available on this system.",
            ConfigError::ReadFailed(_) => "Unable to read the configuration file.",
            ConfigError::WriteFailed(_) => "Unable to write the default configuration file.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Weather query failures.
///
/// The category picks the message shown to the user; it never changes
/// control flow beyond "mandatory path failed" vs "section degraded".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Geolocation permission denied")]
    GeolocationDenied,

    #[error("Geolocation is not supported")]
    GeolocationUnsupported,

    #[error("Geolocation unavailable: {0}")]
    GeolocationUnavailable(String),

    #[error("Partial data unavailable: {0}")]
    PartialDataUnavailable(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::LocationNotFound(_) => "Location not found.",
            WeatherError::NetworkUnavailable(_) => "Unable to fetch weather data.",
            WeatherError::GeolocationDenied => "Location access denied.",
            WeatherError::GeolocationUnsupported => {
                "Location is not available on this device. Search for a city instead."
            }
            WeatherError::GeolocationUnavailable(_) => {
                "Could not determine your location. Search for a city instead."
            }
            WeatherError::PartialDataUnavailable(_) => "Some weather details are unavailable.",
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
        }
    }

    /// True for failures that only degrade a section of the snapshot.
    pub fn is_partial(&self) -> bool {
        matches!(self, WeatherError::PartialDataUnavailable(_))
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
