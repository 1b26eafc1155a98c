//! Terminal rendering of weather results.

use chrono::{DateTime, Utc};
use std::time::Duration;

use skycast_weather::air_quality::level_name;
use skycast_weather::{
    grade_component, AirQualityAnalysis, CacheEntry, DailyBucket, DailySummary, ForecastPoint,
    WeatherSnapshot, Wind,
};

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Eight-point compass direction for a wind bearing in degrees
pub fn compass(degrees: f64) -> &'static str {
    let index = ((degrees.rem_euclid(360.0) + 22.5) / 45.0) as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

fn value(reading: Option<f64>, decimals: usize, unit: &str) -> String {
    match reading {
        Some(v) => format!("{:.*}{}", decimals, v, unit),
        None => "n/a".to_string(),
    }
}

/// `4.6 m/s, gusts up to 9.1 m/s, SW (230°)`
fn wind_info(wind: &Wind) -> Option<String> {
    let mut info = format!("{:.1} m/s", wind.speed?);
    if let Some(gust) = wind.gust {
        info.push_str(&format!(", gusts up to {:.1} m/s", gust));
    }
    if let Some(deg) = wind.deg {
        info.push_str(&format!(", {} ({:.0}°)", compass(deg), deg));
    }
    Some(info)
}

/// One-line summary: `Weather in London: 12.3°C, light rain`
pub fn weather_line(snapshot: &WeatherSnapshot) -> String {
    let place = snapshot.name.as_deref().unwrap_or("the requested location");
    let temp = value(snapshot.main.temp, 1, "°C");
    match snapshot.description() {
        Some(description) => format!("Weather in {}: {}, {}", place, temp, description),
        None => format!("Weather in {}: {}", place, temp),
    }
}

pub fn weather_details(snapshot: &WeatherSnapshot) -> String {
    let mut lines = vec![weather_line(snapshot)];

    if let Some(feels_like) = snapshot.main.feels_like {
        lines.push(format!("  Feels like: {:.1}°C", feels_like));
    }
    if let Some(humidity) = snapshot.main.humidity {
        lines.push(format!("  Humidity: {:.0}%", humidity));
    }
    if let Some(pressure) = snapshot.main.pressure {
        lines.push(format!("  Pressure: {:.0} hPa", pressure));
    }
    if let Some(wind) = wind_info(&snapshot.wind) {
        lines.push(format!("  Wind: {}", wind));
    }
    if let Some(visibility) = snapshot.visibility {
        lines.push(format!("  Visibility: {:.1} km", visibility / 1000.0));
    }
    if let (Some(sunrise), Some(sunset)) = (snapshot.sunrise_local(), snapshot.sunset_local()) {
        lines.push(format!(
            "  Sunrise: {}  Sunset: {}",
            sunrise.format("%H:%M"),
            sunset.format("%H:%M")
        ));
    }

    lines.join("\n")
}

/// Every field of the current conditions plus a one-line air quality verdict.
pub fn extended_weather(snapshot: &WeatherSnapshot, air: Option<&AirQualityAnalysis>) -> String {
    let sun = |time: Option<chrono::NaiveTime>| {
        time.map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "n/a".to_string())
    };
    let air_line = match air.and_then(|a| a.aqi) {
        Some(aqi) => format!("Air composition: AQI {}, {}", aqi, level_name(aqi)),
        None => "Air composition: no data".to_string(),
    };

    [
        format!(
            "Extended data: {}",
            snapshot.name.as_deref().unwrap_or("unknown location")
        ),
        format!("Temperature: {}", value(snapshot.main.temp, 1, "°C")),
        format!("Feels like: {}", value(snapshot.main.feels_like, 1, "°C")),
        format!("Description: {}", snapshot.description().unwrap_or("n/a")),
        format!("Humidity: {}", value(snapshot.main.humidity, 0, "%")),
        format!("Pressure: {}", value(snapshot.main.pressure, 0, " hPa")),
        format!("Cloudiness: {}", value(snapshot.clouds.all, 0, "%")),
        format!("Visibility: {}", value(snapshot.visibility, 0, " m")),
        format!(
            "Wind: {}",
            wind_info(&snapshot.wind).unwrap_or_else(|| "n/a".to_string())
        ),
        format!(
            "Sunrise: {} | Sunset: {}",
            sun(snapshot.sunrise_local()),
            sun(snapshot.sunset_local())
        ),
        air_line,
    ]
    .join("\n")
}

/// Side-by-side temperature, feels-like and humidity for a few cities.
pub fn comparison_table(rows: &[(&str, &WeatherSnapshot)]) -> String {
    let mut table: Vec<[String; 4]> = vec![[
        "City".to_string(),
        "Temp".to_string(),
        "Feels".to_string(),
        "Humidity".to_string(),
    ]];
    for (city, snapshot) in rows {
        table.push([
            city.to_string(),
            value(snapshot.main.temp, 1, "°C"),
            value(snapshot.main.feels_like, 1, "°C"),
            value(snapshot.main.humidity, 0, "%"),
        ]);
    }

    let mut widths = [0usize; 4];
    for row in &table {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    table
        .iter()
        .map(|row| {
            row.iter()
                .zip(widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn cache_report(entry: &CacheEntry, now: DateTime<Utc>, max_age: Duration) -> String {
    let fresh = if entry.is_fresh_at(now, max_age) { "yes" } else { "no" };
    [
        "Cache:".to_string(),
        format!("- key: {}", entry.key()),
        format!("- lat/lon: {}, {}", entry.lat, entry.lon),
        format!("- fetched_at: {}", entry.fetched_at.to_rfc3339()),
        format!("- fresh (<{}h): {}", max_age.as_secs() / 3600, fresh),
        weather_line(&entry.data),
    ]
    .join("\n")
}

pub fn daily_line(bucket: &DailyBucket, summary: &DailySummary) -> String {
    let temps = match (summary.temp_min, summary.temp_max, summary.temp_avg) {
        (Some(min), Some(max), Some(avg)) => {
            format!("{:.1}..{:.1}°C (avg {:.1})", min, max, avg)
        }
        _ => "n/a".to_string(),
    };
    let mut line = format!("{}: {}", bucket.date, temps);
    if let Some(humidity) = summary.humidity_avg {
        line.push_str(&format!(", humidity {:.0}%", humidity));
    }
    if let Some(wind) = summary.wind_speed_avg {
        line.push_str(&format!(", wind {:.1} m/s", wind));
    }
    if let Some(description) = &summary.description {
        line.push_str(&format!(", {}", description));
    }
    line
}

/// Each 3-hour step of one day.
pub fn day_details(date: &str, points: &[ForecastPoint]) -> String {
    let mut lines = vec![format!("{} in 3-hour steps:", date)];
    for point in points {
        lines.push(String::new());
        lines.push(point.dt_txt.clone());
        lines.push(format!("  Temperature: {}", value(point.main.temp, 1, "°C")));
        lines.push(format!("  Feels like: {}", value(point.main.feels_like, 1, "°C")));
        lines.push(format!("  Description: {}", point.description().unwrap_or("n/a")));
        lines.push(format!("  Humidity: {}", value(point.main.humidity, 0, "%")));
        lines.push(format!("  Pressure: {}", value(point.main.pressure, 0, " hPa")));
        lines.push(format!(
            "  Wind: {}",
            wind_info(&point.wind).unwrap_or_else(|| "n/a".to_string())
        ));
        if let Some(pop) = point.pop {
            lines.push(format!("  Chance of precipitation: {:.0}%", pop * 100.0));
        }
    }
    lines.join("\n")
}

/// Analysis with a grade per component. Grades use the threshold table
/// carried by an extended analysis.
pub fn air_report(label: &str, analysis: &AirQualityAnalysis) -> String {
    let Some(aqi) = analysis.aqi else {
        return format!("Air quality for {}: no data", label);
    };

    let mut lines = vec![
        format!("Air quality for {}: {} (AQI {})", label, analysis.status, aqi),
        format!("  {}", level_name(aqi)),
    ];

    if let Some(components) = &analysis.components {
        for (code, reading) in components {
            let threshold = analysis
                .thresholds
                .as_ref()
                .and_then(|table| table.get(code))
                .copied();
            let grade = grade_component(*reading, threshold);
            match threshold {
                Some(limit) => lines.push(format!(
                    "  {:<6} {:>9.2} µg/m³  (limit {}, {})",
                    code,
                    reading,
                    limit,
                    grade.label()
                )),
                None => lines.push(format!(
                    "  {:<6} {:>9.2} µg/m³  ({})",
                    code,
                    reading,
                    grade.label()
                )),
            }
        }
    }

    if let Some(exceeded) = analysis.exceeded_parameters.as_ref().filter(|e| !e.is_empty()) {
        lines.push("  Above threshold:".to_string());
        for item in exceeded {
            lines.push(format!(
                "    {} {:.2} > {} (+{:.2})",
                item.component, item.value, item.threshold, item.excess
            ));
        }
    }

    lines.join("\n")
}
