//! Preference schema migration.
//!
//! Schema 0 (no `schemaVersion` key) kept favorites as a JSON array of
//! names and the unit as a bare string. Schema 1 stores favorites as
//! objects and every value as JSON. Migration runs once when preferences
//! are opened and is idempotent.

use serde_json::Value;
use skyglass_core::StorageError;

use crate::prefs::{dedup_capped, keys, MAX_FAVORITES, MAX_RECENT_SEARCHES};
use crate::store::KeyValueStore;
use crate::types::{FavoriteCity, UnitPreference};

/// Schema version written by this release.
pub const SCHEMA_VERSION: u32 = 1;

/// Outcome of [`run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    /// Favorites rewritten from a bare name into an object.
    pub favorites_converted: usize,
    /// Malformed, duplicate or over-cap entries removed.
    pub dropped: usize,
}

impl MigrationReport {
    /// True when the store was already current.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Preferences migrated from schema {} to {}: {} favorites converted, {} entries dropped",
            self.from, self.to, self.favorites_converted, self.dropped
        )
    }
}

/// Bring `store` up to [`SCHEMA_VERSION`].
pub fn run(store: &dyn KeyValueStore) -> Result<MigrationReport, StorageError> {
    let from = stored_version(store)?;

    if from > SCHEMA_VERSION {
        return Err(StorageError::MigrationFailed(format!(
            "store schema {} is newer than supported schema {}",
            from, SCHEMA_VERSION
        )));
    }

    let mut report = MigrationReport {
        from,
        to: SCHEMA_VERSION,
        ..Default::default()
    };

    if from == SCHEMA_VERSION {
        return Ok(report);
    }

    migrate_unit(store, &mut report)?;
    migrate_favorites(store, &mut report)?;
    migrate_recent_searches(store, &mut report)?;

    store.set(keys::SCHEMA_VERSION, SCHEMA_VERSION.to_string())?;
    Ok(report)
}

fn stored_version(store: &dyn KeyValueStore) -> Result<u32, StorageError> {
    match store.get(keys::SCHEMA_VERSION) {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| {
            StorageError::MigrationFailed(format!("unreadable schema version '{}'", raw))
        }),
    }
}

/// Accept `"imperial"` (JSON) as well as `imperial` (bare).
fn migrate_unit(store: &dyn KeyValueStore, report: &mut MigrationReport) -> Result<(), StorageError> {
    let Some(raw) = store.get(keys::UNIT) else {
        return Ok(());
    };

    let parsed = serde_json::from_str::<UnitPreference>(&raw)
        .ok()
        .or_else(|| raw.parse::<UnitPreference>().ok());

    match parsed {
        Some(unit) => store.set(keys::UNIT, json(&unit)?),
        None => {
            tracing::warn!("Dropping unrecognised unit preference '{}'", raw);
            report.dropped += 1;
            store.remove(keys::UNIT)
        }
    }
}

fn migrate_favorites(
    store: &dyn KeyValueStore,
    report: &mut MigrationReport,
) -> Result<(), StorageError> {
    let Some(entries) = read_array(store, keys::FAVORITES, report)? else {
        return Ok(());
    };

    let mut favorites = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(name) if !name.trim().is_empty() => {
                favorites.push(FavoriteCity::named(name.trim()));
                report.favorites_converted += 1;
            }
            Value::Object(_) => match serde_json::from_value::<FavoriteCity>(entry) {
                Ok(favorite) if !favorite.name.trim().is_empty() => favorites.push(favorite),
                _ => report.dropped += 1,
            },
            _ => report.dropped += 1,
        }
    }

    report.dropped += dedup_capped(&mut favorites, MAX_FAVORITES, |f| f.name.as_str());
    store.set(keys::FAVORITES, json(&favorites)?)
}

fn migrate_recent_searches(
    store: &dyn KeyValueStore,
    report: &mut MigrationReport,
) -> Result<(), StorageError> {
    let Some(entries) = read_array(store, keys::RECENT_SEARCHES, report)? else {
        return Ok(());
    };

    let mut searches = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(term) if !term.trim().is_empty() => searches.push(term.trim().to_string()),
            _ => report.dropped += 1,
        }
    }

    report.dropped += dedup_capped(&mut searches, MAX_RECENT_SEARCHES, |s| s.as_str());
    store.set(keys::RECENT_SEARCHES, json(&searches)?)
}

/// The array stored under `key`. A value that is not an array is removed
/// and counted as one dropped entry.
fn read_array(
    store: &dyn KeyValueStore,
    key: &str,
    report: &mut MigrationReport,
) -> Result<Option<Vec<Value>>, StorageError> {
    let Some(raw) = store.get(key) else {
        return Ok(None);
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(entries)) => Ok(Some(entries)),
        _ => {
            tracing::warn!("Dropping malformed '{}' preference", key);
            report.dropped += 1;
            store.remove(key)?;
            Ok(None)
        }
    }
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::MigrationFailed(e.to_string()))
}
