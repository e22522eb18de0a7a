//! Typed preferences on top of a [`KeyValueStore`].

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use skyglass_core::StorageError;

use crate::migrate::{self, MigrationReport};
use crate::store::{FileStore, KeyValueStore, MemoryStore};
use crate::types::{FavoriteCity, UnitPreference};

/// Store keys. These names are shared with data written by earlier releases.
pub mod keys {
    pub const UNIT: &str = "unit";
    pub const FAVORITES: &str = "favorites";
    pub const RECENT_SEARCHES: &str = "recentSearches";
    pub const ALERT_BANNER: &str = "weatherAlertDismissed";
    pub const RECOMMENDATION_BANNER: &str = "weatherRecommendationDismissed";
    pub const SCHEMA_VERSION: &str = "schemaVersion";
}

pub const MAX_FAVORITES: usize = 5;
pub const MAX_RECENT_SEARCHES: usize = 5;
pub const MAX_SUGGESTIONS: usize = 5;

/// Offered as search suggestions after the user's own recent searches.
pub const POPULAR_CITIES: [&str; 10] = [
    "Mumbai",
    "Delhi",
    "Bangalore",
    "Hyderabad",
    "Chennai",
    "Kolkata",
    "Pune",
    "Ahmedabad",
    "Jaipur",
    "Surat",
];

/// Dismissable banners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Alert,
    Recommendation,
}

impl Banner {
    fn key(self) -> &'static str {
        match self {
            Self::Alert => keys::ALERT_BANNER,
            Self::Recommendation => keys::RECOMMENDATION_BANNER,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BannerState {
    #[serde(rename = "isVisible")]
    is_visible: bool,
}

#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    /// Bring the store up to the current schema and wrap it.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Result<(Self, MigrationReport), StorageError> {
        let report = migrate::run(store.as_ref())?;
        if !report.is_noop() {
            tracing::info!("{}", report);
        }
        Ok((Self { store }, report))
    }

    /// Open the file store at `path`, falling back instead of failing.
    ///
    /// A corrupt file is moved aside to `<path>.corrupt` and replaced with
    /// an empty store. Any other failure, including a schema written by a
    /// newer release, leaves the file untouched and keeps this session's
    /// preferences in memory.
    pub fn open_or_recover(path: &Path) -> Self {
        let store = match FileStore::open(path) {
            Ok(store) => store,
            Err(e @ StorageError::Corruption(_)) => {
                tracing::warn!("{} ({})", e.user_message(), e);
                match set_aside(path).and_then(|()| FileStore::open(path)) {
                    Ok(store) => store,
                    Err(e) => return Self::in_memory(e),
                }
            }
            Err(e) => return Self::in_memory(e),
        };

        match Self::open(Arc::new(store)) {
            Ok((prefs, _)) => prefs,
            Err(e) => Self::in_memory(e),
        }
    }

    fn in_memory(error: StorageError) -> Self {
        tracing::warn!("{} ({}); preferences will not be saved", error.user_message(), error);
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unreadable preference '{}': {}", key, e);
                None
            }
        }
    }

    /// Read a value that is about to be rewritten. An unreadable value is
    /// copied to `<key>.unreadable` first so the rewrite does not lose it.
    fn read_for_update<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key) else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(
                    "Replacing unreadable preference '{}' ({}); old value kept under '{}.unreadable'",
                    key,
                    e,
                    key
                );
                self.store.set(&format!("{}.unreadable", key), raw)?;
                Ok(None)
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(value).map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        self.store.set(key, raw)
    }

    /// Saved unit, or `default` when none was ever chosen.
    pub fn unit(&self, default: UnitPreference) -> UnitPreference {
        self.read(keys::UNIT).unwrap_or(default)
    }

    pub fn set_unit(&self, unit: UnitPreference) -> Result<(), StorageError> {
        self.write(keys::UNIT, &unit)
    }

    /// Favorites, most recently added first.
    pub fn favorites(&self) -> Vec<FavoriteCity> {
        self.read(keys::FAVORITES).unwrap_or_default()
    }

    /// Put `favorite` at the front, replacing an entry with the same name
    /// and evicting the oldest beyond the cap.
    pub fn add_favorite(&self, favorite: FavoriteCity) -> Result<Vec<FavoriteCity>, StorageError> {
        let existing: Vec<FavoriteCity> =
            self.read_for_update(keys::FAVORITES)?.unwrap_or_default();
        let favorites = push_capped(existing, favorite, MAX_FAVORITES, |f| f.name.as_str());
        self.write(keys::FAVORITES, &favorites)?;
        Ok(favorites)
    }

    pub fn remove_favorite(&self, name: &str) -> Result<Vec<FavoriteCity>, StorageError> {
        let mut favorites: Vec<FavoriteCity> =
            self.read_for_update(keys::FAVORITES)?.unwrap_or_default();
        favorites.retain(|f| !same_name(&f.name, name));
        self.write(keys::FAVORITES, &favorites)?;
        Ok(favorites)
    }

    /// Recent search terms, newest first.
    pub fn recent_searches(&self) -> Vec<String> {
        self.read(keys::RECENT_SEARCHES).unwrap_or_default()
    }

    pub fn record_search(&self, term: &str) -> Result<Vec<String>, StorageError> {
        let existing: Vec<String> = self
            .read_for_update(keys::RECENT_SEARCHES)?
            .unwrap_or_default();
        let searches = push_capped(
            existing,
            term.to_string(),
            MAX_RECENT_SEARCHES,
            |s| s.as_str(),
        );
        self.write(keys::RECENT_SEARCHES, &searches)?;
        Ok(searches)
    }

    /// Recent searches, then popular cities, whose names contain `input`
    /// case-insensitively. Blank input has no suggestions.
    pub fn suggestions(&self, input: &str) -> Vec<String> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let candidates = self
            .recent_searches()
            .into_iter()
            .chain(POPULAR_CITIES.iter().map(|city| city.to_string()));

        let mut suggestions: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
        for candidate in candidates {
            if suggestions.len() == MAX_SUGGESTIONS {
                break;
            }
            if candidate.to_lowercase().contains(&needle)
                && !suggestions.iter().any(|s| same_name(s, &candidate))
            {
                suggestions.push(candidate);
            }
        }
        suggestions
    }

    /// Banners are visible until dismissed.
    pub fn banner_visible(&self, banner: Banner) -> bool {
        self.read::<BannerState>(banner.key())
            .map(|state| state.is_visible)
            .unwrap_or(true)
    }

    pub fn set_banner_visible(&self, banner: Banner, visible: bool) -> Result<(), StorageError> {
        self.write(
            banner.key(),
            &BannerState {
                is_visible: visible,
            },
        )
    }
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences").finish_non_exhaustive()
    }
}

/// Move an unreadable store file to `<path>.corrupt`.
fn set_aside(path: &Path) -> Result<(), StorageError> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    std::fs::rename(path, &backup).map_err(|e| {
        StorageError::WriteFailed(format!("moving {} aside: {}", path.display(), e))
    })?;
    tracing::info!("Moved unreadable store to {:?}", backup);
    Ok(())
}

/// Names compare case-insensitively after trimming.
pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Insert `item` at the front of `list`, dropping any entry with the same
/// name and truncating to `cap`.
pub(crate) fn push_capped<T>(
    list: Vec<T>,
    item: T,
    cap: usize,
    name: impl Fn(&T) -> &str,
) -> Vec<T> {
    let mut out = Vec::with_capacity(cap);
    let key = name(&item).to_string();
    out.push(item);
    out.extend(list.into_iter().filter(|existing| !same_name(name(existing), &key)));
    out.truncate(cap);
    out
}

/// Remove later duplicates and truncate to `cap`. Returns how many entries
/// were removed.
pub(crate) fn dedup_capped<T>(list: &mut Vec<T>, cap: usize, name: impl Fn(&T) -> &str) -> usize {
    let before = list.len();
    let mut seen: Vec<String> = Vec::with_capacity(list.len());
    list.retain(|item| {
        let key = name(item).trim().to_ascii_lowercase();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    list.truncate(cap);
    before - list.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn prefs() -> Preferences {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Preferences::open(store).unwrap().0
    }

    #[test]
    fn test_unit_defaults_and_persists() {
        let prefs = prefs();
        assert_eq!(prefs.unit(UnitPreference::Metric), UnitPreference::Metric);
        prefs.set_unit(UnitPreference::Imperial).unwrap();
        assert_eq!(prefs.unit(UnitPreference::Metric), UnitPreference::Imperial);
    }

    #[test]
    fn test_sixth_favorite_evicts_oldest() {
        let prefs = prefs();
        for name in ["Oslo", "Lima", "Rome", "Cairo", "Tokyo"] {
            prefs.add_favorite(FavoriteCity::named(name)).unwrap();
        }
        let favorites = prefs.add_favorite(FavoriteCity::named("Quito")).unwrap();

        let names: Vec<&str> = favorites.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Quito", "Tokyo", "Cairo", "Rome", "Lima"]);
        assert_eq!(prefs.favorites().len(), MAX_FAVORITES);
    }

    #[test]
    fn test_re_adding_favorite_moves_it_to_front() {
        let prefs = prefs();
        prefs.add_favorite(FavoriteCity::named("Oslo")).unwrap();
        prefs.add_favorite(FavoriteCity::named("Lima")).unwrap();
        let mut updated = FavoriteCity::named("oslo");
        updated.temperature = Some(3.0);
        let favorites = prefs.add_favorite(updated).unwrap();

        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].name, "oslo");
        assert_eq!(favorites[0].temperature, Some(3.0));
    }

    #[test]
    fn test_remove_favorite() {
        let prefs = prefs();
        prefs.add_favorite(FavoriteCity::named("Oslo")).unwrap();
        prefs.add_favorite(FavoriteCity::named("Lima")).unwrap();

        let favorites = prefs.remove_favorite("OSLO").unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].name, "Lima");
        assert_eq!(prefs.remove_favorite("Nowhere").unwrap().len(), 1);
    }

    #[test]
    fn test_recent_searches_capped_and_deduplicated() {
        let prefs = prefs();
        for term in ["a", "b", "c", "d", "e", "f", "c"] {
            prefs.record_search(term).unwrap();
        }
        assert_eq!(prefs.recent_searches(), vec!["c", "f", "e", "d", "b"]);
    }

    #[test]
    fn test_banner_visibility_defaults_to_visible() {
        let prefs = prefs();
        assert!(prefs.banner_visible(Banner::Alert));
        prefs.set_banner_visible(Banner::Alert, false).unwrap();
        assert!(!prefs.banner_visible(Banner::Alert));
        assert!(prefs.banner_visible(Banner::Recommendation));
    }

    #[test]
    fn test_banner_stored_in_legacy_shape() {
        let store = Arc::new(MemoryStore::new());
        let (prefs, _) = Preferences::open(store.clone()).unwrap();
        prefs
            .set_banner_visible(Banner::Recommendation, false)
            .unwrap();
        assert_eq!(
            store.get(keys::RECOMMENDATION_BANNER).as_deref(),
            Some(r#"{"isVisible":false}"#)
        );
    }

    #[test]
    fn test_unreadable_value_falls_back_to_default() {
        let store = Arc::new(MemoryStore::with_entries([
            (keys::SCHEMA_VERSION, "1"),
            (keys::FAVORITES, "{broken"),
        ]));
        let (prefs, _) = Preferences::open(store).unwrap();
        assert!(prefs.favorites().is_empty());
    }

    #[test]
    fn test_unreadable_favorites_kept_aside_on_update() {
        let store = Arc::new(MemoryStore::with_entries([
            (keys::SCHEMA_VERSION, "1"),
            (keys::FAVORITES, "{broken"),
        ]));
        let (prefs, _) = Preferences::open(store.clone()).unwrap();

        let favorites = prefs.add_favorite(FavoriteCity::named("Oslo")).unwrap();

        assert_eq!(favorites.len(), 1);
        assert_eq!(store.get("favorites.unreadable").as_deref(), Some("{broken"));
        assert_eq!(prefs.favorites()[0].name, "Oslo");
    }

    #[test]
    fn test_suggestions_merge_recent_and_popular() {
        let prefs = prefs();
        prefs.record_search("Delft").unwrap();
        prefs.record_search("London").unwrap();

        // Recent matches come first; "delhi" is not repeated from the popular list
        prefs.record_search("delhi").unwrap();
        assert_eq!(prefs.suggestions("DEL"), vec!["delhi", "Delft"]);

        assert_eq!(prefs.suggestions("on"), vec!["London"]);
        assert!(prefs.suggestions("   ").is_empty());
        assert!(prefs.suggestions("zzz").is_empty());
    }

    #[test]
    fn test_suggestions_capped() {
        let prefs = prefs();
        // Most popular cities contain an "a"
        let suggestions = prefs.suggestions("a");
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(suggestions[0], "Mumbai");
    }

    #[test]
    fn test_corrupt_file_is_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let prefs = Preferences::open_or_recover(&path);
        prefs.set_unit(UnitPreference::Imperial).unwrap();

        let backup = dir.path().join("store.json.corrupt");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
        let reopened = Preferences::open_or_recover(&path);
        assert_eq!(reopened.unit(UnitPreference::Metric), UnitPreference::Imperial);
    }

    #[test]
    fn test_newer_schema_file_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let content = r#"{ "schemaVersion": "7", "unit": "\"imperial\"" }"#;
        std::fs::write(&path, content).unwrap();

        let prefs = Preferences::open_or_recover(&path);
        prefs.set_unit(UnitPreference::Metric).unwrap();
        prefs.record_search("Oslo").unwrap();

        assert_eq!(prefs.unit(UnitPreference::Imperial), UnitPreference::Metric);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_dedup_capped_counts_removed() {
        let mut list = vec!["a", "B", "b", "c", "d", "e", "f"];
        let removed = dedup_capped(&mut list, 5, |s| *s);
        assert_eq!(list, vec!["a", "B", "c", "d", "e"]);
        assert_eq!(removed, 2);
    }
}
