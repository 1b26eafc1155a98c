//! Daily aggregation of 3-hour forecast points.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::ForecastPoint;

/// Substrings of a condition description that mean rain
const RAIN_MARKERS: [&str; 2] = ["rain", "дожд"];

/// Forecast points sharing one calendar date
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBucket {
    /// `YYYY-MM-DD` as found in the point timestamps
    pub date: String,
    pub points: Vec<ForecastPoint>,
}

/// Statistical reduction of a [`DailyBucket`]. All fields are `None` for an
/// empty bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub temp_avg: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub humidity_avg: Option<f64>,
    pub pressure_avg: Option<f64>,
    pub wind_speed_avg: Option<f64>,
    /// Most frequent description; ties go to the one seen first
    pub description: Option<String>,
}

/// Partition points by the date part of their timestamp, keeping dates in
/// the order they first appear. Points without a timestamp are dropped.
pub fn group_by_day(points: &[ForecastPoint]) -> Vec<DailyBucket> {
    let mut buckets: Vec<DailyBucket> = Vec::new();

    for point in points {
        let Some(date) = point.date_key() else {
            tracing::debug!("Skipping forecast point without timestamp");
            continue;
        };

        match buckets.iter_mut().find(|b| b.date == date) {
            Some(bucket) => bucket.points.push(point.clone()),
            None => buckets.push(DailyBucket {
                date: date.to_string(),
                points: vec![point.clone()],
            }),
        }
    }

    buckets
}

pub fn daily_summary(points: &[ForecastPoint]) -> DailySummary {
    let temps: Vec<f64> = points.iter().filter_map(|p| p.main.temp).collect();
    let humidities: Vec<f64> = points.iter().filter_map(|p| p.main.humidity).collect();
    let pressures: Vec<f64> = points.iter().filter_map(|p| p.main.pressure).collect();
    let wind_speeds: Vec<f64> = points.iter().filter_map(|p| p.wind.speed).collect();
    let descriptions: Vec<&str> = points.iter().filter_map(|p| p.description()).collect();

    DailySummary {
        temp_avg: mean(&temps),
        temp_min: temps.iter().copied().reduce(f64::min),
        temp_max: temps.iter().copied().reduce(f64::max),
        humidity_avg: mean(&humidities),
        pressure_avg: mean(&pressures),
        wind_speed_avg: mean(&wind_speeds),
        description: mode(&descriptions).map(str::to_string),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn mode<'a>(values: &[&'a str]) -> Option<&'a str> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for &value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }

    // Strictly greater keeps the earliest value on ties.
    let mut best: Option<(&'a str, usize)> = None;
    for (value, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

/// True when any point dated `date` mentions rain or has a precipitation
/// probability of at least `probability_threshold`.
pub fn rain_expected_on(
    points: &[ForecastPoint],
    date: NaiveDate,
    probability_threshold: f64,
) -> bool {
    let wanted = date.format("%Y-%m-%d").to_string();

    points
        .iter()
        .filter(|p| p.date_key() == Some(wanted.as_str()))
        .any(|p| {
            let description = p.description().unwrap_or_default().to_lowercase();
            RAIN_MARKERS.iter().any(|m| description.contains(m))
                || p.pop.unwrap_or(0.0) >= probability_threshold
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Condition, MainReadings, Wind};

    fn point(dt_txt: &str, temp: f64, description: &str) -> ForecastPoint {
        ForecastPoint {
            dt_txt: dt_txt.to_string(),
            main: MainReadings {
                temp: Some(temp),
                ..Default::default()
            },
            weather: vec![Condition {
                description: Some(description.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn temp_only(temp: f64) -> ForecastPoint {
        ForecastPoint {
            main: MainReadings {
                temp: Some(temp),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_group_by_day_preserves_first_seen_order() {
        let points = vec![
            point("2024-05-02 21:00:00", 10.0, "clear sky"),
            point("2024-05-01 21:00:00", 11.0, "clear sky"),
            point("2024-05-02 00:00:00", 12.0, "clear sky"),
        ];

        let buckets = group_by_day(&points);
        let dates: Vec<&str> = buckets.iter().map(|b| b.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-05-02", "2024-05-01"]);
        assert_eq!(buckets[0].points.len(), 2);
    }

    #[test]
    fn test_group_by_day_is_a_partition() {
        let points: Vec<ForecastPoint> = (0..16)
            .map(|i| point(&format!("2024-05-0{} {:02}:00:00", 1 + i / 8, (i % 8) * 3), i as f64, "x"))
            .collect();

        let buckets = group_by_day(&points);
        let total: usize = buckets.iter().map(|b| b.points.len()).sum();
        assert_eq!(total, points.len());
        assert_eq!(buckets.len(), 2);
        for bucket in &buckets {
            assert!(bucket.points.iter().all(|p| p.date_key() == Some(bucket.date.as_str())));
        }
    }

    #[test]
    fn test_daily_summary_temperatures() {
        let summary = daily_summary(&[temp_only(10.0), temp_only(20.0)]);
        assert_eq!(summary.temp_avg, Some(15.0));
        assert_eq!(summary.temp_min, Some(10.0));
        assert_eq!(summary.temp_max, Some(20.0));
        assert_eq!(summary.humidity_avg, None);
        assert_eq!(summary.description, None);
    }

    #[test]
    fn test_daily_summary_empty_bucket() {
        assert_eq!(daily_summary(&[]), DailySummary::default());
    }

    #[test]
    fn test_daily_summary_means() {
        let mut a = point("2024-05-01 00:00:00", 1.0, "rain");
        a.main.humidity = Some(80.0);
        a.main.pressure = Some(1000.0);
        a.wind = Wind {
            speed: Some(2.0),
            ..Default::default()
        };
        let mut b = point("2024-05-01 03:00:00", 3.0, "rain");
        b.main.humidity = Some(60.0);
        b.main.pressure = Some(1010.0);
        b.wind = Wind {
            speed: Some(4.0),
            ..Default::default()
        };

        let summary = daily_summary(&[a, b]);
        assert_eq!(summary.humidity_avg, Some(70.0));
        assert_eq!(summary.pressure_avg, Some(1005.0));
        assert_eq!(summary.wind_speed_avg, Some(3.0));
    }

    #[test]
    fn test_description_mode_and_tie_break() {
        let points = vec![
            point("2024-05-01 00:00:00", 1.0, "clouds"),
            point("2024-05-01 03:00:00", 1.0, "rain"),
            point("2024-05-01 06:00:00", 1.0, "rain"),
        ];
        assert_eq!(daily_summary(&points).description.as_deref(), Some("rain"));

        let tied = vec![
            point("2024-05-01 00:00:00", 1.0, "clouds"),
            point("2024-05-01 03:00:00", 1.0, "rain"),
        ];
        assert_eq!(daily_summary(&tied).description.as_deref(), Some("clouds"));
    }

    #[test]
    fn test_rain_expected_by_description_or_probability() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let dry = vec![
            point("2024-05-01 12:00:00", 1.0, "light rain"),
            point("2024-05-02 12:00:00", 1.0, "clear sky"),
        ];
        assert!(!rain_expected_on(&dry, date, 0.4));

        let described = vec![point("2024-05-02 12:00:00", 1.0, "Light Rain")];
        assert!(rain_expected_on(&described, date, 0.4));

        let russian = vec![point("2024-05-02 12:00:00", 1.0, "небольшой дождь")];
        assert!(rain_expected_on(&russian, date, 0.4));

        let mut likely = point("2024-05-02 15:00:00", 1.0, "overcast clouds");
        likely.pop = Some(0.4);
        assert!(rain_expected_on(&[likely], date, 0.4));
    }
}
