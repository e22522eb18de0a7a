//! Weather aggregation service.
//!
//! Coordinates geolocation, search, the three weather fetches and the
//! preference store, and publishes one [`WeatherSnapshot`] through a
//! `tokio::sync::watch` channel.
//!
//! Every query bumps the snapshot's generation inside the channel's write
//! lock. Each result is applied only if its generation is still current, so
//! a slow response never overwrites a newer query.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use skyglass_core::{Config, NetworkError, StorageError, UnitPreference, WeatherError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::advisory::{self, Alert, Recommendation};
use crate::geocode;
use crate::location::{self, GeolocationProvider};
use crate::prefs::{Banner, Preferences};
use crate::provider::WeatherProvider;
use crate::state::{QueryPhase, QueryTarget, Section, WeatherSnapshot};
use crate::types::{AirQualitySample, Coordinates, CurrentConditions, FavoriteCity, ForecastSeries};

type Pending<T> = JoinHandle<Result<T, NetworkError>>;

pub struct WeatherService {
    provider: WeatherProvider,
    geolocation: Arc<dyn GeolocationProvider>,
    geolocation_timeout: Duration,
    prefs: Preferences,
    state: watch::Sender<WeatherSnapshot>,
}

impl WeatherService {
    /// The saved unit preference wins over `default_unit`.
    pub fn new(
        provider: WeatherProvider,
        geolocation: Arc<dyn GeolocationProvider>,
        geolocation_timeout: Duration,
        prefs: Preferences,
        default_unit: UnitPreference,
    ) -> Self {
        let unit = prefs.unit(default_unit);
        Self {
            provider,
            geolocation,
            geolocation_timeout,
            prefs,
            state: watch::Sender::new(WeatherSnapshot::new(unit)),
        }
    }

    pub fn from_config(config: &Config, prefs: Preferences) -> Result<Self, NetworkError> {
        Ok(Self::new(
            WeatherProvider::from_config(&config.weather)?,
            location::from_config(&config.location),
            Duration::from_secs(config.location.timeout_secs),
            prefs,
            config.weather.default_unit,
        ))
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherSnapshot> {
        self.state.subscribe()
    }

    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> WeatherSnapshot {
        self.state.borrow().clone()
    }

    pub fn unit(&self) -> UnitPreference {
        self.state.borrow().unit
    }

    /// Weather for the device position.
    pub async fn locate(&self) {
        let generation = self.begin(QueryTarget::CurrentLocation, None, None);
        self.run_for_location(generation).await;
    }

    /// Weather for a place name. Blank input is ignored.
    pub async fn search(&self, query: &str) {
        let term = query.trim();
        if term.is_empty() {
            tracing::debug!("Ignoring empty search");
            return;
        }

        if let Err(e) = self.prefs.record_search(term) {
            tracing::warn!("Failed to save recent search: {}", e);
        }

        let generation = self.begin(QueryTarget::Place(term.to_string()), None, None);
        tracing::info!("Searching for '{}' (query {})", term, generation);
        self.run_for_place(generation, term).await;
    }

    /// Weather for explicit coordinates.
    pub async fn fetch_coordinates(&self, at: Coordinates) {
        let generation = self.begin(QueryTarget::Coordinates(at), Some(at), None);
        tracing::info!("Fetching weather for {} (query {})", at, generation);
        self.run_for_coordinates(generation, at).await;
    }

    /// Re-run the last query. Data for the same place and unit stays
    /// visible until the new result arrives.
    pub async fn refresh(&self) {
        self.requery(None).await;
    }

    /// Persist `unit` and re-query in it.
    pub async fn set_unit(&self, unit: UnitPreference) {
        if let Err(e) = self.prefs.set_unit(unit) {
            tracing::warn!("Failed to save unit preference: {}", e);
        }

        if self.unit() != unit {
            tracing::info!("Unit changed to {}", unit.as_query());
            self.requery(Some(unit)).await;
        }
    }

    pub async fn toggle_unit(&self) {
        self.set_unit(self.unit().toggled()).await;
    }

    /// Save the displayed place. Without current conditions the list is
    /// returned unchanged.
    pub fn add_favorite(&self) -> Result<Vec<FavoriteCity>, StorageError> {
        let current = self.state.borrow().current.clone();
        match current {
            Some(current) => self.prefs.add_favorite(FavoriteCity::from_conditions(&current)),
            None => {
                tracing::debug!("No current conditions to save as favorite");
                Ok(self.prefs.favorites())
            }
        }
    }

    pub fn remove_favorite(&self, name: &str) -> Result<Vec<FavoriteCity>, StorageError> {
        self.prefs.remove_favorite(name)
    }

    pub fn favorites(&self) -> Vec<FavoriteCity> {
        self.prefs.favorites()
    }

    pub fn recent_searches(&self) -> Vec<String> {
        self.prefs.recent_searches()
    }

    /// Search suggestions for partially typed input.
    pub fn suggestions(&self, input: &str) -> Vec<String> {
        self.prefs.suggestions(input)
    }

    /// Alert for the displayed conditions, unless the banner was dismissed.
    pub fn alert(&self) -> Option<Alert> {
        if !self.prefs.banner_visible(Banner::Alert) {
            return None;
        }
        self.state
            .borrow()
            .current
            .as_ref()
            .and_then(advisory::evaluate_alert)
    }

    /// Recommendation for the displayed conditions at `now`, unless the
    /// banner was dismissed.
    pub fn recommendation(&self, now: DateTime<Utc>) -> Option<Recommendation> {
        if !self.prefs.banner_visible(Banner::Recommendation) {
            return None;
        }
        self.state
            .borrow()
            .current
            .as_ref()
            .and_then(|current| advisory::recommend(current, now))
    }

    pub fn dismiss_alert(&self) -> Result<(), StorageError> {
        self.prefs.set_banner_visible(Banner::Alert, false)
    }

    pub fn dismiss_recommendation(&self) -> Result<(), StorageError> {
        self.prefs.set_banner_visible(Banner::Recommendation, false)
    }

    /// Run the last query again, switching to `unit` first when given.
    async fn requery(&self, unit: Option<UnitPreference>) {
        let (target, coordinates) = {
            let snapshot = self.state.borrow();
            (snapshot.target.clone(), snapshot.coordinates)
        };

        match (coordinates, target) {
            (Some(at), target) => {
                let generation = self.begin(target, Some(at), unit);
                tracing::info!("Refreshing {} (query {})", at, generation);
                self.run_for_coordinates(generation, at).await;
            }
            (None, QueryTarget::Place(name)) => {
                let generation = self.begin(QueryTarget::Place(name.clone()), None, unit);
                self.run_for_place(generation, &name).await;
            }
            (None, QueryTarget::Coordinates(at)) => {
                let generation = self.begin(QueryTarget::Coordinates(at), Some(at), unit);
                self.run_for_coordinates(generation, at).await;
            }
            (None, QueryTarget::CurrentLocation) => {
                let generation = self.begin(QueryTarget::CurrentLocation, None, unit);
                self.run_for_location(generation).await;
            }
            (None, QueryTarget::None) => match unit {
                Some(unit) => {
                    self.state.send_if_modified(|s| {
                        let changed = s.unit != unit;
                        s.unit = unit;
                        changed
                    });
                }
                None => tracing::debug!("Nothing to refresh"),
            },
        }
    }

    /// Start a query: bump the generation, switch to `unit` if given, mark
    /// loading and clear data that no longer matches `at` in the active unit.
    /// All of it happens in one channel write, so no older result can land
    /// between the unit change and the generation bump.
    fn begin(
        &self,
        target: QueryTarget,
        at: Option<Coordinates>,
        unit: Option<UnitPreference>,
    ) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            if let Some(unit) = unit {
                s.unit = unit;
            }
            if s.can_keep_data(at, s.unit) {
                s.degraded.clear();
            } else {
                s.clear_data();
            }
            s.target = target;
            s.phase = QueryPhase::Loading;
        });
        generation
    }

    /// Apply `update` if `generation` is still the latest query.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut WeatherSnapshot)) -> bool {
        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            update(s);
            true
        });
        if !applied {
            tracing::debug!("Discarding result of superseded query {}", generation);
        }
        applied
    }

    fn fail(&self, generation: u64, error: WeatherError) {
        tracing::info!("Query {} failed: {}", generation, error);
        self.apply(generation, |s| {
            s.clear_data();
            s.phase = s.phase.on_failure(error);
        });
    }

    async fn run_for_location(&self, generation: u64) {
        tracing::info!("Locating device (query {})", generation);

        match location::locate_with_timeout(self.geolocation.as_ref(), self.geolocation_timeout)
            .await
        {
            Ok(at) => self.run_for_coordinates(generation, at).await,
            Err(e) => {
                tracing::warn!("Geolocation failed: {}", e);
                self.fail(generation, e.into());
            }
        }
    }

    fn unit_for(&self, generation: u64) -> Option<UnitPreference> {
        let snapshot = self.state.borrow();
        (snapshot.generation == generation).then_some(snapshot.unit)
    }

    async fn run_for_coordinates(&self, generation: u64, at: Coordinates) {
        let Some(unit) = self.unit_for(generation) else {
            return;
        };

        let (forecast, air_quality) = self.spawn_secondary(generation, at, unit);

        match self.provider.current_by_coordinates(at, unit).await {
            Ok(mut current) => {
                geocode::fill_place_name(&self.provider, &mut current).await;
                if self.publish_current(generation, current) {
                    self.collect_secondary(generation, forecast, air_quality).await;
                } else {
                    forecast.abort();
                    air_quality.abort();
                }
            }
            Err(e) => {
                forecast.abort();
                air_quality.abort();
                self.fail(generation, classify(e, None));
            }
        }
    }

    async fn run_for_place(&self, generation: u64, place: &str) {
        let Some(unit) = self.unit_for(generation) else {
            return;
        };

        match self.provider.current_by_name(place, unit).await {
            Ok(current) => {
                let at = current.coordinates;
                if !self.publish_current(generation, current) {
                    return;
                }
                let (forecast, air_quality) = self.spawn_secondary(generation, at, unit);
                self.collect_secondary(generation, forecast, air_quality).await;
            }
            Err(e) => self.fail(generation, classify(e, Some(place))),
        }
    }

    /// Issue the forecast and air-quality fetches and mark both sections
    /// pending. Sections still showing data for the same place keep it.
    fn spawn_secondary(
        &self,
        generation: u64,
        at: Coordinates,
        unit: UnitPreference,
    ) -> (Pending<ForecastSeries>, Pending<AirQualitySample>) {
        let provider = self.provider.clone();
        let forecast = tokio::spawn(async move { provider.forecast(at, unit).await });
        let provider = self.provider.clone();
        let air_quality = tokio::spawn(async move { provider.air_quality(at).await });

        self.apply(generation, |s| {
            if s.forecast.as_ready().is_none() {
                s.forecast = Section::Pending;
            }
            if s.air_quality.as_ready().is_none() {
                s.air_quality = Section::Pending;
            }
        });

        (forecast, air_quality)
    }

    fn publish_current(&self, generation: u64, current: CurrentConditions) -> bool {
        let at = current.coordinates;
        let place = current.display_name();
        let published = self.apply(generation, |s| {
            s.coordinates = Some(at);
            s.current = Some(current);
            s.phase = s.phase.on_current_ready();
        });
        if published {
            tracing::info!("Current conditions ready for {} (query {})", place, generation);
        }
        published
    }

    /// Merge each secondary section as soon as its fetch settles.
    async fn collect_secondary(
        &self,
        generation: u64,
        forecast: Pending<ForecastSeries>,
        air_quality: Pending<AirQualitySample>,
    ) {
        let forecast = async {
            let result = settle(forecast.await);
            self.merge(generation, "forecast", result, |s, section| s.forecast = section);
        };
        let air_quality = async {
            let result = settle(air_quality.await);
            self.merge(generation, "air quality", result, |s, section| {
                s.air_quality = section
            });
        };
        tokio::join!(forecast, air_quality);
    }

    fn merge<T>(
        &self,
        generation: u64,
        name: &str,
        result: Result<T, String>,
        set: impl FnOnce(&mut WeatherSnapshot, Section<T>),
    ) {
        match result {
            Ok(value) => {
                self.apply(generation, |s| set(s, Section::Ready(value)));
            }
            Err(reason) => {
                tracing::warn!("{} unavailable (query {}): {}", name, generation, reason);
                self.apply(generation, |s| {
                    set(s, Section::Unavailable);
                    s.degraded
                        .push(WeatherError::PartialDataUnavailable(format!("{}: {}", name, reason)));
                });
            }
        }
    }
}

impl std::fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherService")
            .field("provider", &self.provider)
            .field("geolocation_timeout", &self.geolocation_timeout)
            .finish_non_exhaustive()
    }
}

fn settle<T>(joined: Result<Result<T, NetworkError>, JoinError>) -> Result<T, String> {
    match joined {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("task did not complete: {}", e)),
    }
}

/// Map a mandatory-path failure to the category shown to the user.
/// `place` is set for name searches, where 404 means the name is unknown.
fn classify(error: NetworkError, place: Option<&str>) -> WeatherError {
    match (error.status(), place) {
        (Some(401), _) => WeatherError::InvalidApiKey,
        (Some(404), Some(place)) => WeatherError::LocationNotFound(place.to_string()),
        _ => WeatherError::NetworkUnavailable(error.to_string()),
    }
}
