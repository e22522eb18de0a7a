//! Weather service for Skyglass
//!
//! Aggregates current conditions, forecast and air quality from
//! OpenWeatherMap for the device position or a searched place, and keeps
//! user preferences in a local key-value store.

pub mod advisory;
pub mod client;
pub mod derive;
pub mod geocode;
pub mod location;
pub mod migrate;
pub mod prefs;
pub mod provider;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use advisory::{Alert, AlertKind, DayPeriod, Recommendation, Severity};
pub use geocode::reverse_geocode;
pub use location::{
    DisabledLocation, FixedLocation, GeolocationProvider, IpGeolocation, UnsupportedLocation,
};
pub use migrate::MigrationReport;
pub use prefs::{Banner, Preferences};
pub use provider::{PlaceName, WeatherProvider};
pub use service::WeatherService;
pub use state::{QueryPhase, QueryTarget, Section, WeatherSnapshot};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::*;

pub use skyglass_core::WeatherError;
