//! Weather lookups for Skycast
//!
//! Geocoding, current conditions, forecasts and air pollution from an
//! OpenWeatherMap-compatible API, with retries, a single-slot fallback cache,
//! air quality analysis and subscription notifications.

pub mod types;
pub mod error;
pub mod retry;
pub mod cache;
pub mod gateway;
pub mod forecast;
pub mod air_quality;
pub mod user_store;
pub mod notify;

pub use types::*;
pub use error::{describe_status, CacheError, TransientRequestError, WeatherError};
pub use retry::{with_retry, RetryPolicy};
pub use cache::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore, ResultCache};
pub use gateway::WeatherGateway;
pub use forecast::{daily_summary, group_by_day, rain_expected_on, DailyBucket, DailySummary};
pub use air_quality::{analyze, grade_component, AirQualityAnalysis, ComponentGrade};
pub use user_store::{Subscription, UserDocument, UserId, UserRecord, UserStore};
pub use notify::{utc_tomorrow, Notification, NotificationSweep, Notifier, SweepReport};
