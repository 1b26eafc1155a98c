//! Single-slot result cache used as a fallback when the provider is unreachable.
//!
//! The gateway writes the slot after every successful current-weather fetch.
//! Nothing reads it before a live fetch; only the front-end consults it after
//! a transient failure, through [`ResultCache::fallback_for`].

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::types::{Coordinates, LocationQuery, WeatherSnapshot};

/// Maximum age of an entry that may replace a live result
pub const MAX_CACHE_AGE: Duration = Duration::from_secs(3 * 60 * 60);

/// Coordinates closer than this on both axes are the same location
pub const COORDINATE_TOLERANCE: f64 = 1e-6;

/// The cached lookup, persisted as `{city, lat, lon, fetched_at, data}`.
///
/// `city` is set when the lookup was made by name; the entry is then keyed by
/// city even though the resolved coordinates are stored too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub city: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(with = "iso_utc")]
    pub fetched_at: DateTime<Utc>,
    pub data: WeatherSnapshot,
}

impl CacheEntry {
    pub fn new(
        city: Option<String>,
        coords: Coordinates,
        data: WeatherSnapshot,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            city,
            lat: coords.lat,
            lon: coords.lon,
            fetched_at,
            data,
        }
    }

    /// The query this entry answers
    pub fn key(&self) -> LocationQuery {
        match &self.city {
            Some(city) => LocationQuery::City(city.clone()),
            None => LocationQuery::coordinates(self.lat, self.lon),
        }
    }

    /// Fresh iff `0 <= now - fetched_at <= max_age`. Entries from the future
    /// (clock skew) are never fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age <= max_age,
            Err(_) => false,
        }
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.is_fresh_at(Utc::now(), max_age)
    }

    /// City queries compare trimmed and case-insensitively; coordinate queries
    /// compare within [`COORDINATE_TOLERANCE`]. A city query never matches a
    /// coordinate-keyed entry, nor the other way round.
    pub fn matches(&self, query: &LocationQuery) -> bool {
        match (query, &self.city) {
            (LocationQuery::City(wanted), Some(cached)) => {
                wanted.trim().to_lowercase() == cached.trim().to_lowercase()
            }
            (LocationQuery::Coordinates(wanted), None) => {
                floats_close(wanted.lat, self.lat) && floats_close(wanted.lon, self.lon)
            }
            _ => false,
        }
    }
}

fn floats_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= COORDINATE_TOLERANCE
}

/// Storage for the single cache slot.
///
/// Implementations are best-effort: a failed read is an empty cache and a
/// failed write is logged and dropped.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Option<CacheEntry>;

    /// Replace whatever is stored with `entry`.
    fn save(&self, entry: &CacheEntry);
}

/// JSON file holding one [`CacheEntry`].
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the slot. A missing file is `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`CacheError`] when the file cannot be read or parsed.
    pub fn try_load(&self) -> Result<Option<CacheEntry>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let entry = serde_json::from_str(&contents)?;
        Ok(Some(entry))
    }

    /// # Errors
    /// Returns [`CacheError`] when the file cannot be written.
    pub fn try_save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entry)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Option<CacheEntry> {
        match self.try_load() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Ignoring cache at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, entry: &CacheEntry) {
        if let Err(e) = self.try_save(entry) {
            tracing::warn!("Failed to write cache {}: {}", self.path.display(), e);
        }
    }
}

/// In-process slot, for tests and for running without a writable disk.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    slot: Mutex<Option<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(entry: CacheEntry) -> Self {
        Self {
            slot: Mutex::new(Some(entry)),
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Option<CacheEntry> {
        self.slot.lock().clone()
    }

    fn save(&self, entry: &CacheEntry) {
        *self.slot.lock() = Some(entry.clone());
    }
}

/// The result cache as seen by the gateway and its callers.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    max_age: Duration,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            max_age: MAX_CACHE_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Overwrite the slot with a lookup made just now.
    pub fn save(&self, city: Option<&str>, coords: Coordinates, data: &WeatherSnapshot) {
        let entry = CacheEntry::new(city.map(str::to_string), coords, data.clone(), Utc::now());
        tracing::debug!("Caching weather for {}", entry.key());
        self.store.save(&entry);
    }

    pub fn load(&self) -> Option<CacheEntry> {
        self.store.load()
    }

    /// The stored entry, if it answers `query` and is fresh at `now`.
    pub fn fallback_for(&self, query: &LocationQuery, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = self.load()?;
        if !entry.matches(query) {
            tracing::debug!("Cached entry for {} does not match {}", entry.key(), query);
            return None;
        }
        if !entry.is_fresh_at(now, self.max_age) {
            tracing::debug!("Cached entry from {} is stale", entry.fetched_at);
            return None;
        }
        Some(entry)
    }
}

/// ISO-8601 timestamps; values without an offset are read as UTC.
mod iso_utc {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
