//! Weather data gateway: geocoding, current conditions, forecast and air
//! pollution lookups against an OpenWeatherMap-compatible API.
//!
//! Every request goes through [`with_retry`]. Only current-weather lookups
//! touch the [`ResultCache`], and only to write it.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use skycast_core::{ProviderConfig, RetryConfig};

use crate::cache::ResultCache;
use crate::error::{describe_status, TransientRequestError, WeatherError};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{
    Coordinates, ForecastPoint, ForecastResponse, GeocodeHit, LocationQuery, PollutionReading,
    PollutionResponse, WeatherSnapshot,
};

const USER_AGENT: &str = "skycast/0.1.0";
const DEFAULT_GEO_BASE: &str = "http://api.openweathermap.org/geo/1.0";
const DEFAULT_DATA_BASE: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Clone)]
pub struct WeatherGateway {
    client: Arc<Client>,
    api_key: String,
    geo_base_url: String,
    data_base_url: String,
    units: String,
    lang: String,
    policy: RetryPolicy,
    cache: ResultCache,
}

impl WeatherGateway {
    /// Gateway against the public endpoints with the default retry policy.
    ///
    /// # Errors
    /// Returns [`WeatherError::Setup`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, cache: ResultCache) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(WeatherError::Setup)?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.into(),
            geo_base_url: DEFAULT_GEO_BASE.to_string(),
            data_base_url: DEFAULT_DATA_BASE.to_string(),
            units: "metric".to_string(),
            lang: "en".to_string(),
            policy: RetryPolicy::default(),
            cache,
        })
    }

    /// # Errors
    /// Returns [`WeatherError::MissingApiKey`] when no key is configured.
    pub fn from_config(
        provider: &ProviderConfig,
        retry: &RetryConfig,
        cache: ResultCache,
    ) -> Result<Self, WeatherError> {
        let api_key = provider.api_key().ok_or(WeatherError::MissingApiKey)?;
        let mut gateway = Self::new(api_key, cache)?
            .with_base_urls(&provider.geo_base_url, &provider.data_base_url)
            .with_retry_policy(RetryPolicy::from_config(retry));
        gateway.units = provider.units.clone();
        gateway.lang = provider.lang.clone();
        Ok(gateway)
    }

    pub fn with_base_urls(mut self, geo_base_url: &str, data_base_url: &str) -> Self {
        self.geo_base_url = geo_base_url.trim_end_matches('/').to_string();
        self.data_base_url = data_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// GET `url` with the API key appended, retrying transient failures.
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Response, TransientRequestError> {
        with_retry(&self.policy, || {
            self.client
                .get(url)
                .query(params)
                .query(&[("appid", self.api_key.as_str())])
                .timeout(self.policy.timeout)
                .send()
        })
        .await
    }

    /// Resolve a city name to coordinates using the first geocoder hit.
    ///
    /// # Errors
    /// [`WeatherError::NotFound`] for an empty result list,
    /// [`WeatherError::Transient`] after exhausted retries,
    /// [`WeatherError::Http`] for any other non-200 status.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn geocode(&self, city: &str) -> Result<Coordinates, WeatherError> {
        let url = format!("{}/direct", self.geo_base_url);
        let response = self
            .get(&url, &[("q", city.to_string()), ("limit", "1".to_string())])
            .await?;

        let hits: Vec<GeocodeHit> = read_json(response, "geocoding").await?;
        match hits.first() {
            Some(hit) => Ok(Coordinates::new(hit.lat, hit.lon)),
            None => {
                tracing::warn!("Geocoder returned no results for {:?}", city);
                Err(WeatherError::NotFound(city.to_string()))
            }
        }
    }

    /// Current conditions for a city or a coordinate pair.
    ///
    /// A city is resolved to coordinates first. Success overwrites the result
    /// cache with the query and the snapshot.
    ///
    /// # Errors
    /// See [`WeatherGateway::geocode`]; the conditions request itself fails
    /// with [`WeatherError::Transient`] or [`WeatherError::Http`].
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn current_weather(
        &self,
        query: &LocationQuery,
    ) -> Result<WeatherSnapshot, WeatherError> {
        match query {
            LocationQuery::City(city) => {
                let coords = self.geocode(city).await?;
                let snapshot = self.weather_by_coordinates(coords).await?;
                self.cache.save(Some(city.as_str()), coords, &snapshot);
                Ok(snapshot)
            }
            LocationQuery::Coordinates(coords) => {
                let snapshot = self.weather_by_coordinates(*coords).await?;
                self.cache.save(None, *coords, &snapshot);
                Ok(snapshot)
            }
        }
    }

    async fn weather_by_coordinates(
        &self,
        coords: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/weather", self.data_base_url);
        let response = self.get(&url, &self.located_params(coords)).await?;
        read_json(response, "current weather").await
    }

    /// 5-day forecast in 3-hour steps.
    ///
    /// Any failure yields an empty list, which callers must read as
    /// "forecast unavailable".
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn forecast_5day_3hour(&self, coords: Coordinates) -> Vec<ForecastPoint> {
        let url = format!("{}/forecast", self.data_base_url);
        let response = match self.get(&url, &self.located_params(coords)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Forecast unavailable: {}", e);
                return Vec::new();
            }
        };

        match read_json::<ForecastResponse>(response, "forecast").await {
            Ok(body) => body.list,
            Err(e) => {
                tracing::warn!("Forecast unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Current air pollution: the first entry of the provider's list, or an
    /// empty reading on any failure.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn air_pollution(&self, coords: Coordinates) -> PollutionReading {
        let url = format!("{}/air_pollution", self.data_base_url);
        let params = [("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())];
        let response = match self.get(&url, &params).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Air pollution unavailable: {}", e);
                return PollutionReading::default();
            }
        };

        match read_json::<PollutionResponse>(response, "air pollution").await {
            Ok(body) => body
                .list
                .into_iter()
                .next()
                .map(PollutionReading::from)
                .unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Air pollution unavailable: {}", e);
                PollutionReading::default()
            }
        }
    }

    fn located_params(&self, coords: Coordinates) -> [(&'static str, String); 4] {
        [
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("units", self.units.clone()),
            ("lang", self.lang.clone()),
        ]
    }
}

/// Decode a 200 response; anything else becomes [`WeatherError::Http`].
async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, WeatherError> {
    let status = response.status();
    if status != StatusCode::OK {
        tracing::warn!(
            "{} request failed: HTTP {} ({})",
            what,
            status.as_u16(),
            describe_status(status.as_u16())
        );
        return Err(WeatherError::Http {
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| WeatherError::Decode(format!("{}: {}", what, e)))
}
