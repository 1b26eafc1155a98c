//! Per-user preferences and subscription state, persisted as one JSON
//! document `{ "users": { "<id>": { ... } } }`.
//!
//! Every operation reads the whole document, changes it and writes it back.
//! Concurrent writers are not coordinated: the last write wins.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::types::Coordinates;

pub type UserId = i64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

impl UserDocument {
    pub fn user(&self, user_id: UserId) -> Option<&UserRecord> {
        self.users.get(&user_id.to_string())
    }

    /// Record for `user_id`, created empty if absent.
    pub fn user_mut(&mut self, user_id: UserId) -> &mut UserRecord {
        self.users.entry(user_id.to_string()).or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    /// Keys written by other front-ends are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub enabled: bool,
    /// Local date a rain warning was last sent
    #[serde(default)]
    pub last_rain_alert: Option<NaiveDate>,
    /// Condition description last reported to the user
    #[serde(default)]
    pub last_condition: Option<String>,
    #[serde(default)]
    pub last_condition_time: Option<NaiveDateTime>,
}

impl Subscription {
    fn fresh(enabled: bool) -> Self {
        Self {
            enabled,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns [`CacheError`] when the file exists but cannot be read or
    /// parsed.
    pub fn try_load_document(&self) -> Result<UserDocument, CacheError> {
        if !self.path.exists() {
            return Ok(UserDocument::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// The stored document; missing or malformed files read as empty.
    pub fn load_document(&self) -> UserDocument {
        match self.try_load_document() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Ignoring user data at {}: {}", self.path.display(), e);
                UserDocument::default()
            }
        }
    }

    /// # Errors
    /// Returns [`CacheError`] when the file cannot be written.
    pub fn try_save_document(&self, document: &UserDocument) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Write `document`; failures are logged and dropped.
    pub fn save_document(&self, document: &UserDocument) {
        if let Err(e) = self.try_save_document(document) {
            tracing::warn!("Failed to write user data {}: {}", self.path.display(), e);
        }
    }

    fn update(&self, user_id: UserId, change: impl FnOnce(&mut UserRecord)) {
        let mut document = self.load_document();
        change(document.user_mut(user_id));
        self.save_document(&document);
    }

    pub fn user(&self, user_id: UserId) -> UserRecord {
        self.load_document()
            .user(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_location(&self, user_id: UserId, coords: Coordinates) {
        tracing::debug!("Storing location {} for user {}", coords, user_id);
        self.update(user_id, |record| record.location = Some(coords));
    }

    pub fn location(&self, user_id: UserId) -> Option<Coordinates> {
        self.user(user_id).location
    }

    pub fn set_last_city(&self, user_id: UserId, city: &str) {
        self.update(user_id, |record| record.last_city = Some(city.to_string()));
    }

    pub fn last_city(&self, user_id: UserId) -> Option<String> {
        self.user(user_id).last_city
    }

    /// Turn notifications on or off. Either way the alert history is cleared.
    pub fn set_subscription(&self, user_id: UserId, enabled: bool) {
        tracing::info!(
            "{} notifications for user {}",
            if enabled { "Enabling" } else { "Disabling" },
            user_id
        );
        self.update(user_id, |record| {
            record.subscription = Some(Subscription::fresh(enabled))
        });
    }

    /// The user's subscription; disabled when never set.
    pub fn subscription(&self, user_id: UserId) -> Subscription {
        self.user(user_id).subscription.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, UserStore) {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path().join("user_data.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty_document() {
        let (_dir, store) = store();
        assert_eq!(store.load_document(), UserDocument::default());
        assert_eq!(store.location(1), None);
        assert!(!store.subscription(1).enabled);
    }

    #[test]
    fn test_malformed_file_is_empty_document() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "[not a document").unwrap();
        assert!(store.load_document().users.is_empty());
    }

    #[test]
    fn test_location_and_last_city_round_trip() {
        let (_dir, store) = store();
        store.set_location(42, Coordinates::new(55.75, 37.62));
        store.set_last_city(42, "Moscow");

        assert_eq!(store.location(42), Some(Coordinates::new(55.75, 37.62)));
        assert_eq!(store.last_city(42).as_deref(), Some("Moscow"));
        assert_eq!(store.last_city(7), None);
    }

    #[test]
    fn test_set_subscription_resets_history() {
        let (_dir, store) = store();
        let mut document = UserDocument::default();
        document.user_mut(5).subscription = Some(Subscription {
            enabled: true,
            last_rain_alert: NaiveDate::from_ymd_opt(2024, 5, 1),
            last_condition: Some("rain".to_string()),
            last_condition_time: None,
        });
        store.save_document(&document);

        store.set_subscription(5, true);
        let subscription = store.subscription(5);
        assert!(subscription.enabled);
        assert_eq!(subscription.last_rain_alert, None);
        assert_eq!(subscription.last_condition, None);

        store.set_subscription(5, false);
        assert!(!store.subscription(5).enabled);
    }

    #[test]
    fn test_reads_document_with_user_id_keys() {
        let (_dir, store) = store();
        std::fs::write(
            store.path(),
            r#"{
                "users": {
                    "123": {
                        "location": {"lat": 59.93, "lon": 30.31},
                        "last_city": "Санкт-Петербург",
                        "subscription": {
                            "enabled": true,
                            "last_rain_alert": "2024-05-01",
                            "last_condition": "overcast clouds",
                            "last_condition_time": "2024-05-01T10:15:00.123456"
                        },
                        "state": "wait_city"
                    }
                }
            }"#,
        )
        .unwrap();

        let record = store.user(123);
        assert_eq!(record.last_city.as_deref(), Some("Санкт-Петербург"));
        let subscription = record.subscription.unwrap();
        assert!(subscription.enabled);
        assert_eq!(subscription.last_rain_alert, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(subscription.last_condition_time.is_some());
        assert_eq!(record.extra.get("state"), Some(&serde_json::json!("wait_city")));
    }

    #[test]
    fn test_unknown_keys_survive_updates() {
        let (_dir, store) = store();
        std::fs::write(store.path(), r#"{"users": {"9": {"state": "idle"}}}"#).unwrap();

        store.set_last_city(9, "Oslo");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["users"]["9"]["state"], "idle");
        assert_eq!(raw["users"]["9"]["last_city"], "Oslo");
    }

    #[test]
    fn test_unwritable_path_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = UserStore::new(blocker.join("user_data.json"));

        store.set_last_city(1, "Paris");
        assert_eq!(store.last_city(1), None);
    }
}
