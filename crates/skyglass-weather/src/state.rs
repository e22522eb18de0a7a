//! Snapshot published to subscribers.
//!
//! One [`WeatherSnapshot`] describes everything a view needs: which query
//! ran, how far it got, and the data sections fetched for it.

use chrono::{DateTime, Utc};
use skyglass_core::WeatherError;

use crate::types::{AirQualitySample, Coordinates, CurrentConditions, ForecastSeries, UnitPreference};

/// Progress of the latest query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(WeatherError),
}

impl QueryPhase {
    /// True once the query finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, QueryPhase::Ready | QueryPhase::Failed(_))
    }

    pub fn error(&self) -> Option<&WeatherError> {
        match self {
            QueryPhase::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// State after current conditions arrived.
    pub fn on_current_ready(&self) -> Self {
        QueryPhase::Ready
    }

    /// State after the mandatory part of the query failed.
    pub fn on_failure(&self, error: WeatherError) -> Self {
        QueryPhase::Failed(error)
    }
}

/// A secondary data section.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    /// No query has asked for it
    Absent,
    /// Requested and in flight
    Pending,
    Ready(T),
    /// The fetch failed; the rest of the snapshot is still valid
    Unavailable,
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::Absent
    }
}

impl<T> Section<T> {
    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// What the latest query asked for.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryTarget {
    #[default]
    None,
    CurrentLocation,
    Coordinates(Coordinates),
    Place(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeatherSnapshot {
    /// Bumped by every query; results from older queries are discarded.
    pub generation: u64,
    pub phase: QueryPhase,
    pub unit: UnitPreference,
    pub target: QueryTarget,
    /// Coordinates the data sections belong to
    pub coordinates: Option<Coordinates>,
    pub current: Option<CurrentConditions>,
    pub forecast: Section<ForecastSeries>,
    pub air_quality: Section<AirQualitySample>,
    /// Best-effort sections that failed for this query
    pub degraded: Vec<WeatherError>,
}

impl WeatherSnapshot {
    pub fn new(unit: UnitPreference) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    /// Drop every data section.
    pub fn clear_data(&mut self) {
        self.coordinates = None;
        self.current = None;
        self.forecast = Section::Absent;
        self.air_quality = Section::Absent;
        self.degraded.clear();
    }

    /// True when data already on screen can stay while re-querying `at` in `unit`.
    pub fn can_keep_data(&self, at: Option<Coordinates>, unit: UnitPreference) -> bool {
        match (self.coordinates, at) {
            (Some(have), Some(want)) => {
                self.current.as_ref().is_some_and(|c| c.unit == unit) && have.same_place(&want)
            }
            _ => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.phase.is_settled()
    }

    pub fn error(&self) -> Option<&WeatherError> {
        self.phase.error()
    }

    /// Message for the status line: the failure, or the first degraded section.
    pub fn user_message(&self) -> Option<&'static str> {
        self.error()
            .or_else(|| self.degraded.first())
            .map(WeatherError::user_message)
    }

    /// Day/night at the displayed location. `None` without current conditions.
    pub fn is_daytime_at(&self, now: DateTime<Utc>) -> Option<bool> {
        self.current.as_ref().map(|c| c.is_daytime_at(now))
    }
}
