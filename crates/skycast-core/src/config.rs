use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `provider.api_key`.
pub const API_KEY_ENV: &str = "API_KEY";

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

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the config, cache and user files
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub users: UsersConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Weather provider endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key; `API_KEY` in the environment takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the geocoding API (`/direct` is appended)
    pub geo_base_url: String,

    /// Base URL of the data API (`/weather`, `/forecast`, `/air_pollution`)
    pub data_base_url: String,

    /// Unit system passed to the provider
    pub units: String,

    /// Language for condition descriptions
    pub lang: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geo_base_url: "http://api.openweathermap.org/geo/1.0".to_string(),
            data_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            units: "metric".to_string(),
            lang: "en".to_string(),
        }
    }
}

impl ProviderConfig {
    /// The API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Retry schedule for provider requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Sleep before each retry, in seconds; its length is the retry count
    pub backoff_secs: Vec<u64>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_secs: vec![1, 2, 4],
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub file_name: String,

    /// Maximum age of a cached result that may replace a live fetch
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_name: "weather_cache.json".to_string(),
            max_age_secs: 3 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    pub file_name: String,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            file_name: "user_data.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Minutes between two subscription sweeps
    pub interval_minutes: u64,

    /// Precipitation probability that counts as "rain expected"
    pub rain_probability_threshold: f64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 120,
            rain_probability_threshold: 0.4,
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skycast")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            users: UsersConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    /// Environment overrides are applied afterwards.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration and validate it.
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
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

    /// Take the API key from the environment when it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.provider.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.geo_base_url, "provider.geo_base_url", &mut result);
        self.validate_url(&self.provider.data_base_url, "provider.data_base_url", &mut result);

        if self.provider.api_key().is_none() {
            result.add_warning(
                "provider.api_key",
                "No API key configured - set API_KEY or provider.api_key",
            );
        }

        if self.retry.backoff_secs.is_empty() {
            result.add_error("retry.backoff_secs", "Backoff schedule must not be empty");
        }
        if self.retry.timeout_secs == 0 {
            result.add_error("retry.timeout_secs", "Timeout must be greater than 0");
        }

        if self.cache.max_age_secs == 0 {
            result.add_warning("cache.max_age_secs", "Cache fallback disabled (0 seconds)");
        }

        if self.notifications.interval_minutes == 0 {
            result.add_error(
                "notifications.interval_minutes",
                "Notification interval must be greater than 0",
            );
        }
        if !(0.0..=1.0).contains(&self.notifications.rain_probability_threshold) {
            result.add_error(
                "notifications.rain_probability_threshold",
                "Probability threshold must be between 0 and 1",
            );
        }

        result
    }

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
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(ConfigError::Write)?;
        Ok(())
    }

    /// Path of the result cache file
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join(&self.cache.file_name)
    }

    /// Path of the user store file
    pub fn users_path(&self) -> PathBuf {
        self.config_dir.join(&self.users.file_name)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_defaults_match_provider_contract() {
        let config = Config::default();
        assert_eq!(config.retry.backoff_secs, vec![1, 2, 4]);
        assert_eq!(config.retry.timeout_secs, 10);
        assert_eq!(config.cache.max_age_secs, 10_800);
        assert_eq!(config.notifications.interval_minutes, 120);
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "provider.api_key"));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let mut config = Config::default();
        config.provider.api_key = Some("   ".to_string());
        assert!(config.provider.api_key().is_none());
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.provider.data_base_url = "ftp://example.org".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_empty_backoff_is_error() {
        let mut config = Config::default();
        config.retry.backoff_secs.clear();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "retry.backoff_secs"));
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(config.cache_path(), dir.path().join("weather_cache.json"));
    }

    #[test]
    fn test_load_from_reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/skycast\"\n[retry]\nbackoff_secs = [0]\ntimeout_secs = 3\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.retry.backoff_secs, vec![0]);
        assert_eq!(config.retry.timeout_secs, 3);
        assert_eq!(config.provider.units, "metric");
    }

    #[test]
    fn test_load_from_fills_missing_section_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[provider]\napi_key = \"abc\"\n[retry]\ntimeout_secs = 5\n[notifications]\ninterval_minutes = 30\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider.api_key(), Some("abc"));
        assert_eq!(config.provider.geo_base_url, "http://api.openweathermap.org/geo/1.0");
        assert_eq!(config.provider.lang, "en");
        assert_eq!(config.retry.backoff_secs, vec![1, 2, 4]);
        assert_eq!(config.retry.timeout_secs, 5);
        assert_eq!(config.notifications.interval_minutes, 30);
        assert_eq!(config.notifications.rain_probability_threshold, 0.4);
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
