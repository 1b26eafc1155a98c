//! Periodic weather notifications for subscribed users.
//!
//! A sweep walks the user document, fetches forecast and current conditions
//! for every enabled subscription with a stored location, and hands rain
//! warnings and condition changes to a [`Notifier`].

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::forecast::rain_expected_on;
use crate::gateway::WeatherGateway;
use crate::types::{Coordinates, LocationQuery};
use crate::user_store::{Subscription, UserId, UserStore};

/// Precipitation probability at which a forecast point counts as rain
pub const DEFAULT_RAIN_PROBABILITY: f64 = 0.4;

/// Pause before each sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RainTomorrow,
    ConditionChanged { description: String },
}

impl Notification {
    pub fn message(&self) -> String {
        match self {
            Self::RainTomorrow => "Rain is possible tomorrow. Take an umbrella.".to_string(),
            Self::ConditionChanged { description } => {
                format!("Weather change: now {}.", description.to_lowercase())
            }
        }
    }
}

/// Delivery surface for notifications (chat, log, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: UserId, notification: &Notification);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, user_id: UserId, notification: &Notification) {
        (**self).notify(user_id, notification)
    }
}

/// Counters for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub skipped: usize,
    pub sent: usize,
}

/// The UTC calendar day after `now`. Forecast `dt_txt` timestamps are UTC,
/// so "tomorrow" for the rain check is counted on that calendar.
pub fn utc_tomorrow(now: DateTime<Utc>) -> Option<NaiveDate> {
    now.date_naive().succ_opt()
}

pub struct NotificationSweep<N> {
    gateway: WeatherGateway,
    store: UserStore,
    notifier: N,
    rain_probability: f64,
}

impl<N: Notifier> NotificationSweep<N> {
    pub fn new(gateway: WeatherGateway, store: UserStore, notifier: N) -> Self {
        Self {
            gateway,
            store,
            notifier,
            rain_probability: DEFAULT_RAIN_PROBABILITY,
        }
    }

    pub fn with_rain_probability(mut self, threshold: f64) -> Self {
        self.rain_probability = threshold;
        self
    }

    /// Sweep every subscribed user once. `today` is the local calendar date
    /// used for the once-a-day rain warning; `rain_day` is the forecast date
    /// checked for rain, in the UTC dating of forecast timestamps.
    ///
    /// Failures for one user only skip that user. The document is written
    /// back once, at the end.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_once(&self, today: NaiveDate, rain_day: NaiveDate) -> SweepReport {
        let mut document = self.store.load_document();
        let mut report = SweepReport::default();

        for (key, record) in document.users.iter_mut() {
            let Some(subscription) = record.subscription.as_mut().filter(|s| s.enabled) else {
                continue;
            };
            let Some(coords) = record.location else {
                continue;
            };
            let Ok(user_id) = key.parse::<UserId>() else {
                tracing::warn!("Skipping user with non-numeric id {:?}", key);
                continue;
            };

            report.checked += 1;
            match self.check_user(user_id, coords, subscription, today, rain_day).await {
                Some(sent) => report.sent += sent,
                None => report.skipped += 1,
            }
        }

        self.store.save_document(&document);
        tracing::info!(
            "Notification sweep done: {} checked, {} skipped, {} sent",
            report.checked,
            report.skipped,
            report.sent
        );
        report
    }

    /// Returns the number of notifications sent, or `None` if the user was
    /// skipped.
    async fn check_user(
        &self,
        user_id: UserId,
        coords: Coordinates,
        subscription: &mut Subscription,
        today: NaiveDate,
        rain_day: NaiveDate,
    ) -> Option<usize> {
        let forecast = self.gateway.forecast_5day_3hour(coords).await;
        if forecast.is_empty() {
            tracing::debug!("No forecast for user {}, skipping", user_id);
            return None;
        }
        let current = match self
            .gateway
            .current_weather(&LocationQuery::Coordinates(coords))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("No current weather for user {}: {}", user_id, e);
                return None;
            }
        };

        let mut sent = 0;

        if rain_expected_on(&forecast, rain_day, self.rain_probability)
            && subscription.last_rain_alert != Some(today)
        {
            self.notifier.notify(user_id, &Notification::RainTomorrow);
            subscription.last_rain_alert = Some(today);
            sent += 1;
        }

        if let Some(description) = current.description().filter(|d| !d.is_empty()) {
            if subscription.last_condition.as_deref() != Some(description) {
                self.notifier.notify(
                    user_id,
                    &Notification::ConditionChanged {
                        description: description.to_string(),
                    },
                );
                subscription.last_condition = Some(description.to_string());
                subscription.last_condition_time = Some(Local::now().naive_local());
                sent += 1;
            }
        }

        Some(sent)
    }

    /// Sleep `interval`, sweep, repeat. Never returns.
    pub async fn run(&self, interval: Duration) {
        tracing::info!("Notification loop started, every {:?}", interval);
        loop {
            tokio::time::sleep(interval).await;
            let now = Utc::now();
            let Some(rain_day) = utc_tomorrow(now) else {
                continue;
            };
            self.run_once(now.with_timezone(&Local).date_naive(), rain_day)
                .await;
        }
    }
}
