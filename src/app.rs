//! Shared application state for the terminal front-end.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

use skycast_core::Config;
use skycast_weather::{
    analyze, daily_summary, group_by_day, CacheEntry, FileCacheStore, LocationQuery,
    NotificationSweep, ResultCache, UserStore, WeatherError, WeatherGateway, WeatherSnapshot,
};

use crate::display;
use crate::notifier::LogNotifier;

/// User id the terminal front-end stores its preferences under
pub const LOCAL_USER_ID: i64 = 0;

/// Forecast dates shown in a summary
pub const MAX_FORECAST_DAYS: usize = 5;

pub struct App {
    pub config: Config,
    pub cache: ResultCache,
    pub users: UserStore,
    /// `None` without an API key; cache and user store still work.
    gateway: Option<WeatherGateway>,
}

/// Attach the user-facing message to a weather error.
pub fn report_error(e: WeatherError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

impl App {
    /// Wire the gateway, cache and user store from configuration.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be built. A missing API key only
    /// disables network lookups.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = FileCacheStore::new(config.cache_path());
        let cache = ResultCache::new(Arc::new(store))
            .with_max_age(Duration::from_secs(config.cache.max_age_secs));
        let gateway =
            match WeatherGateway::from_config(&config.provider, &config.retry, cache.clone()) {
                Ok(gateway) => Some(gateway),
                Err(WeatherError::MissingApiKey) => {
                    tracing::warn!("No API key configured, weather lookups are disabled");
                    None
                }
                Err(e) => return Err(report_error(e)),
            };
        let users = UserStore::new(config.users_path());

        tracing::info!(
            "Using cache {} and user data {}",
            config.cache_path().display(),
            config.users_path().display()
        );

        Ok(Self {
            config,
            cache,
            users,
            gateway,
        })
    }

    /// # Errors
    /// [`WeatherError::MissingApiKey`] when no key is configured.
    pub fn gateway(&self) -> Result<&WeatherGateway, WeatherError> {
        self.gateway.as_ref().ok_or(WeatherError::MissingApiKey)
    }

    pub async fn current_weather(&self, query: &LocationQuery) -> Result<WeatherSnapshot, WeatherError> {
        self.gateway()?.current_weather(query).await
    }

    /// Cached entry usable in place of a failed live lookup for `query`
    pub fn cached_fallback(&self, query: &LocationQuery) -> Option<CacheEntry> {
        self.cache.fallback_for(query, Utc::now())
    }

    /// Non-interactive lookup: a fresh matching cache entry stands in for a
    /// transient failure without asking.
    pub async fn weather_report(&self, query: &LocationQuery) -> Result<String, WeatherError> {
        match self.current_weather(query).await {
            Ok(snapshot) => Ok(display::weather_details(&snapshot)),
            Err(e) if e.is_transient() => {
                let entry = self.cached_fallback(query).ok_or(e)?;
                tracing::info!("Answering {} from cache", entry.key());
                Ok(format!(
                    "(cached at {})\n{}",
                    entry.fetched_at.to_rfc3339(),
                    display::weather_details(&entry.data)
                ))
            }
            Err(e) => Err(e),
        }
    }

    pub fn cache_report(&self) -> String {
        match self.cache.load() {
            Some(entry) => display::cache_report(&entry, Utc::now(), self.cache.max_age()),
            None => "No cached weather.".to_string(),
        }
    }

    /// Daily summaries for the first five forecast dates of `city`.
    ///
    /// # Errors
    /// Only geocoding errors; an unavailable forecast is reported in the text.
    pub async fn forecast_report(&self, city: &str) -> Result<String, WeatherError> {
        let gateway = self.gateway()?;
        let coords = gateway.geocode(city).await?;
        let points = gateway.forecast_5day_3hour(coords).await;
        if points.is_empty() {
            return Ok(format!("Forecast for {} is unavailable.", city));
        }

        let mut buckets = group_by_day(&points);
        buckets.sort_by(|a, b| a.date.cmp(&b.date));
        buckets.truncate(MAX_FORECAST_DAYS);

        let mut lines = vec![format!("5-day forecast for {}:", city)];
        for bucket in &buckets {
            let summary = daily_summary(&bucket.points);
            lines.push(display::daily_line(bucket, &summary));
        }
        Ok(lines.join("\n"))
    }

    /// Every 3-hour step forecast for `city` on `date`.
    ///
    /// # Errors
    /// Only geocoding errors; a missing date is reported in the text.
    pub async fn day_details_report(&self, city: &str, date: NaiveDate) -> Result<String, WeatherError> {
        let gateway = self.gateway()?;
        let coords = gateway.geocode(city).await?;
        let points = gateway.forecast_5day_3hour(coords).await;
        if points.is_empty() {
            return Ok(format!("Forecast for {} is unavailable.", city));
        }

        let key = date.format("%Y-%m-%d").to_string();
        match group_by_day(&points).into_iter().find(|b| b.date == key) {
            Some(bucket) => Ok(display::day_details(&bucket.date, &bucket.points)),
            None => Ok(format!("No forecast for {} on {}.", city, key)),
        }
    }

    /// Current conditions in full plus the air quality level.
    ///
    /// # Errors
    /// Errors of the current weather lookup; missing pollution data is
    /// reported in the text.
    pub async fn extended_report(&self, city: &str) -> Result<String, WeatherError> {
        let gateway = self.gateway()?;
        let snapshot = gateway.current_weather(&LocationQuery::city(city)).await?;
        let air = match snapshot.coord {
            Some(coords) => Some(analyze(&gateway.air_pollution(coords).await, true)),
            None => {
                tracing::debug!("Snapshot for {:?} carries no coordinates", city);
                None
            }
        };
        Ok(display::extended_weather(&snapshot, air.as_ref()))
    }

    /// Current temperature, feels-like and humidity for two cities.
    ///
    /// # Errors
    /// The first failing lookup.
    pub async fn compare_report(&self, first: &str, second: &str) -> Result<String, WeatherError> {
        let gateway = self.gateway()?;
        let a = gateway.current_weather(&LocationQuery::city(first)).await?;
        let b = gateway.current_weather(&LocationQuery::city(second)).await?;
        Ok(format!(
            "Comparison:\n{}",
            display::comparison_table(&[(first, &a), (second, &b)])
        ))
    }

    /// Air quality analysis with per-component grades for `city`.
    ///
    /// # Errors
    /// Only geocoding errors; missing pollution data is reported in the text.
    pub async fn air_report(&self, city: &str) -> Result<String, WeatherError> {
        let gateway = self.gateway()?;
        let coords = gateway.geocode(city).await?;
        let reading = gateway.air_pollution(coords).await;
        let analysis = analyze(&reading, true);
        Ok(display::air_report(city, &analysis))
    }

    /// # Errors
    /// [`WeatherError::MissingApiKey`] when no key is configured.
    pub fn notification_sweep(&self) -> Result<NotificationSweep<LogNotifier>, WeatherError> {
        Ok(
            NotificationSweep::new(self.gateway()?.clone(), self.users.clone(), LogNotifier)
                .with_rain_probability(self.config.notifications.rain_probability_threshold),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.config.notifications.interval_minutes * 60)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// App storing its files under a fresh temp dir. With `server`, requests
    /// go to that base URI without backoff pauses.
    pub fn app(server: Option<&str>, api_key: Option<&str>) -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.config_dir = dir.path().to_path_buf();
        config.provider.api_key = api_key.map(str::to_string);
        if let Some(uri) = server {
            config.provider.geo_base_url = format!("{}/geo/1.0", uri);
            config.provider.data_base_url = format!("{}/data/2.5", uri);
            config.retry.backoff_secs = vec![0, 0, 0];
            config.retry.timeout_secs = 5;
        }
        let app = App::from_config(config).unwrap();
        (dir, app)
    }

    pub fn snapshot(name: &str, temp: f64) -> WeatherSnapshot {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "coord": {"lat": 1.0, "lon": 2.0},
            "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 60.0},
            "weather": [{"description": "clear sky"}]
        }))
        .unwrap()
    }
}
