pub mod config;
pub mod error;

pub use config::{Config, LocationConfig, LocationMode, UnitPreference, ValidationResult, WeatherConfig};
pub use error::{
    AppError, ConfigError, NetworkError, ReqwestErrorExt, StorageError, WeatherError,
};

use anyhow::Result;

/// Initialize logging for the application
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Skyglass core initialized");
    Ok(())
}
