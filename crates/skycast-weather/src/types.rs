use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// What the caller asked for: a city name or a coordinate pair, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates(Coordinates),
}

impl LocationQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self::Coordinates(Coordinates::new(lat, lon))
    }
}

impl std::fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City(name) => f.write_str(name),
            Self::Coordinates(coords) => write!(f, "{}", coords),
        }
    }
}

/// One entry of the geocoder's result list
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeocodeHit {
    pub lat: f64,
    pub lon: f64,
}

/// `main` block shared by current conditions and forecast points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainReadings {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

/// Weather condition as described by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    pub id: Option<i64>,
    pub main: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysInfo {
    pub country: Option<String>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clouds {
    pub all: Option<f64>,
}

/// Current conditions as returned by the provider.
///
/// Every field is optional so partial responses (and old cache files)
/// still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSnapshot {
    pub coord: Option<Coordinates>,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    pub wind: Wind,
    pub clouds: Clouds,
    pub visibility: Option<f64>,
    pub sys: SysInfo,
    /// Offset from UTC in seconds
    pub timezone: Option<i32>,
    pub name: Option<String>,
    pub dt: Option<i64>,
}

impl WeatherSnapshot {
    /// Description of the first reported condition
    pub fn description(&self) -> Option<&str> {
        self.weather.first().and_then(|c| c.description.as_deref())
    }

    pub fn sunrise_local(&self) -> Option<NaiveTime> {
        self.sys.sunrise.and_then(|ts| local_time(ts, self.timezone.unwrap_or(0)))
    }

    pub fn sunset_local(&self) -> Option<NaiveTime> {
        self.sys.sunset.and_then(|ts| local_time(ts, self.timezone.unwrap_or(0)))
    }
}

/// Convert an epoch timestamp to wall-clock time at `offset_secs` from UTC.
fn local_time(epoch_secs: i64, offset_secs: i32) -> Option<NaiveTime> {
    let offset = FixedOffset::east_opt(offset_secs)?;
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    Some(utc.with_timezone(&offset).time())
}

/// One 3-hour step of the 5-day forecast
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastPoint {
    pub dt: Option<i64>,
    /// Provider timestamp, `YYYY-MM-DD HH:MM:SS` in UTC
    pub dt_txt: String,
    pub main: MainReadings,
    pub weather: Vec<Condition>,
    pub wind: Wind,
    /// Probability of precipitation, 0.0 - 1.0
    pub pop: Option<f64>,
}

impl ForecastPoint {
    /// Date portion of the timestamp string, if there is one
    pub fn date_key(&self) -> Option<&str> {
        self.dt_txt.split_whitespace().next()
    }

    pub fn description(&self) -> Option<&str> {
        self.weather.first().and_then(|c| c.description.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ForecastResponse {
    pub list: Vec<ForecastPoint>,
}

/// Pollutant concentrations (µg/m³) keyed by provider code, plus the AQI if known
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutionReading {
    pub aqi: Option<u8>,
    pub components: BTreeMap<String, f64>,
}

impl PollutionReading {
    pub fn is_empty(&self) -> bool {
        self.aqi.is_none() && self.components.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PollutionResponse {
    pub list: Vec<PollutionEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PollutionEntry {
    pub main: PollutionMain,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PollutionMain {
    pub aqi: Option<u8>,
}

impl From<PollutionEntry> for PollutionReading {
    fn from(entry: PollutionEntry) -> Self {
        Self {
            aqi: entry.main.aqi,
            components: entry.components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_parses_provider_shape() {
        let json = serde_json::json!({
            "coord": {"lon": 60.6122, "lat": 56.8519},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {"temp": 12.5, "feels_like": 11.0, "pressure": 1012, "humidity": 81},
            "wind": {"speed": 4.2, "deg": 250},
            "sys": {"country": "RU", "sunrise": 1700000000, "sunset": 1700030000},
            "timezone": 18000,
            "name": "Yekaterinburg"
        });

        let snapshot: WeatherSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot.description(), Some("light rain"));
        assert_eq!(snapshot.main.humidity, Some(81.0));
        assert_eq!(snapshot.coord, Some(Coordinates::new(56.8519, 60.6122)));
        assert_eq!(snapshot.name.as_deref(), Some("Yekaterinburg"));
    }

    #[test]
    fn test_sun_times_use_timezone_offset() {
        let snapshot = WeatherSnapshot {
            sys: SysInfo {
                sunrise: Some(0),
                sunset: Some(12 * 3600),
                ..Default::default()
            },
            timezone: Some(5 * 3600),
            ..Default::default()
        };

        assert_eq!(snapshot.sunrise_local(), NaiveTime::from_hms_opt(5, 0, 0));
        assert_eq!(snapshot.sunset_local(), NaiveTime::from_hms_opt(17, 0, 0));
    }

    #[test]
    fn test_forecast_point_date_key() {
        let point = ForecastPoint {
            dt_txt: "2024-05-01 15:00:00".to_string(),
            ..Default::default()
        };
        assert_eq!(point.date_key(), Some("2024-05-01"));
        assert_eq!(ForecastPoint::default().date_key(), None);
    }

    #[test]
    fn test_pollution_entry_conversion() {
        let json = serde_json::json!({
            "main": {"aqi": 2},
            "components": {"co": 201.94, "pm2_5": 3.1}
        });
        let entry: PollutionEntry = serde_json::from_value(json).unwrap();
        let reading = PollutionReading::from(entry);
        assert_eq!(reading.aqi, Some(2));
        assert_eq!(reading.components.get("pm2_5"), Some(&3.1));
        assert!(!reading.is_empty());
        assert!(PollutionReading::default().is_empty());
    }
}
