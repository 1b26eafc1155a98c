//! Interactive terminal menu.

use anyhow::Result;
use chrono::NaiveDate;
use std::io::{BufRead, Write};

use skycast_weather::{LocationQuery, WeatherError, WeatherSnapshot};

use crate::app::{App, LOCAL_USER_ID};
use crate::display;

const MENU: &str = "\
=== Skycast ===
1 - Weather by city
2 - Weather by coordinates
3 - Show cache
4 - 5-day forecast
5 - Air quality
6 - Compare two cities
7 - Extended data
8 - Forecast details for one day
0 - Exit";

/// Parse a coordinate typed by a person; `,` is accepted as the decimal
/// separator.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Split `Moscow, Kazan` (or `Moscow; Kazan`) into exactly two city names.
pub fn parse_city_pair(raw: &str) -> Option<(String, String)> {
    let cities: Vec<&str> = raw
        .split([',', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    match cities.as_slice() {
        [first, second] => Some((first.to_string(), second.to_string())),
        _ => None,
    }
}

/// Answers that accept the cache fallback; empty means yes.
fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "" | "y" | "yes" | "д" | "да"
    )
}

pub struct Repl<'a, R, W> {
    app: &'a App,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Repl<'a, R, W> {
    pub fn new(app: &'a App, input: R, out: W) -> Self {
        Self { app, input, out }
    }

    /// Run the menu until the user exits or input ends.
    ///
    /// # Errors
    /// Only terminal I/O failures.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            writeln!(self.out)?;
            writeln!(self.out, "{}", MENU)?;

            let Some(choice) = self.prompt("Choose an option: ")? else {
                writeln!(self.out)?;
                writeln!(self.out, "Exit.")?;
                return Ok(());
            };

            match choice.as_str() {
                "0" => {
                    writeln!(self.out, "Exit.")?;
                    return Ok(());
                }
                "1" => self.weather_by_city().await?,
                "2" => self.weather_by_coordinates().await?,
                "3" => writeln!(self.out, "{}", self.app.cache_report())?,
                "4" => self.forecast().await?,
                "5" => self.air_quality().await?,
                "6" => self.compare().await?,
                "7" => self.extended().await?,
                "8" => self.day_details().await?,
                _ => writeln!(self.out, "Unknown option. Enter a number from 0 to 8.")?,
            }
        }
    }

    /// Print `text` and read one trimmed line; `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.out, "{}", text)?;
        self.out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask for a city, offering the last one used as default. End of input
    /// cancels.
    fn prompt_city(&mut self) -> Result<Option<String>> {
        let default = self.app.users.last_city(LOCAL_USER_ID);
        let text = match &default {
            Some(city) => format!("City (Enter = {}): ", city),
            None => "City: ".to_string(),
        };

        let city = match self.prompt(&text)? {
            None => return Ok(None),
            Some(typed) if !typed.is_empty() => Some(typed),
            Some(_) => default,
        };
        if city.is_none() {
            writeln!(self.out, "No city given.")?;
        }
        Ok(city)
    }

    async fn weather_by_city(&mut self) -> Result<()> {
        let Some(city) = self.prompt_city()? else {
            return Ok(());
        };
        self.app.users.set_last_city(LOCAL_USER_ID, &city);
        self.show_weather(&LocationQuery::City(city)).await
    }

    async fn weather_by_coordinates(&mut self) -> Result<()> {
        let lat = self.prompt("Latitude: ")?.as_deref().and_then(parse_coordinate);
        let lon = self.prompt("Longitude: ")?.as_deref().and_then(parse_coordinate);
        match (lat, lon) {
            (Some(lat), Some(lon)) => self.show_weather(&LocationQuery::coordinates(lat, lon)).await,
            _ => {
                writeln!(self.out, "Invalid coordinates.")?;
                Ok(())
            }
        }
    }

    async fn show_weather(&mut self, query: &LocationQuery) -> Result<()> {
        match self.fetch_with_fallback(query).await? {
            Some(snapshot) => writeln!(self.out, "{}", display::weather_details(&snapshot))?,
            None => writeln!(self.out, "Could not get the weather.")?,
        }
        Ok(())
    }

    /// Live lookup; after a transient failure, offer a fresh matching cache
    /// entry instead.
    async fn fetch_with_fallback(&mut self, query: &LocationQuery) -> Result<Option<WeatherSnapshot>> {
        let error = match self.app.current_weather(query).await {
            Ok(snapshot) => return Ok(Some(snapshot)),
            Err(e) => e,
        };

        if !error.is_transient() {
            tracing::debug!("Lookup for {} failed: {}", query, error);
            writeln!(self.out, "{}", error.user_message())?;
            return Ok(None);
        }

        let Some(entry) = self.app.cached_fallback(query) else {
            writeln!(self.out, "Network error: {}", error)?;
            return Ok(None);
        };

        let hours = self.app.cache.max_age().as_secs() / 3600;
        let answer = self.prompt(&format!(
            "Network error while fetching weather. Show cached data (fresher than {} hours)? [Y/n]: ",
            hours
        ))?;
        if answer.as_deref().is_some_and(is_yes) {
            tracing::info!("Serving cached weather from {}", entry.fetched_at);
            return Ok(Some(entry.data));
        }
        Ok(None)
    }

    async fn forecast(&mut self) -> Result<()> {
        let Some(city) = self.prompt_city()? else {
            return Ok(());
        };
        self.app.users.set_last_city(LOCAL_USER_ID, &city);
        let report = self.app.forecast_report(&city).await;
        self.print_report(report)
    }

    async fn air_quality(&mut self) -> Result<()> {
        let Some(city) = self.prompt_city()? else {
            return Ok(());
        };
        self.app.users.set_last_city(LOCAL_USER_ID, &city);
        let report = self.app.air_report(&city).await;
        self.print_report(report)
    }

    async fn compare(&mut self) -> Result<()> {
        let Some(raw) = self.prompt("Two cities separated by a comma: ")? else {
            return Ok(());
        };
        let Some((first, second)) = parse_city_pair(&raw) else {
            writeln!(self.out, "Enter two cities separated by a comma, e.g. Moscow, Kazan")?;
            return Ok(());
        };
        let report = self.app.compare_report(&first, &second).await;
        self.print_report(report)
    }

    async fn extended(&mut self) -> Result<()> {
        let Some(city) = self.prompt_city()? else {
            return Ok(());
        };
        self.app.users.set_last_city(LOCAL_USER_ID, &city);
        let report = self.app.extended_report(&city).await;
        self.print_report(report)
    }

    async fn day_details(&mut self) -> Result<()> {
        let Some(city) = self.prompt_city()? else {
            return Ok(());
        };
        let Some(raw) = self.prompt("Date (YYYY-MM-DD): ")? else {
            return Ok(());
        };
        let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") else {
            writeln!(self.out, "Invalid date.")?;
            return Ok(());
        };
        self.app.users.set_last_city(LOCAL_USER_ID, &city);
        let report = self.app.day_details_report(&city, date).await;
        self.print_report(report)
    }

    fn print_report(&mut self, report: Result<String, WeatherError>) -> Result<()> {
        match report {
            Ok(text) => writeln!(self.out, "{}", text)?,
            Err(e) => {
                tracing::debug!("Report failed: {}", e);
                writeln!(self.out, "{}", e.user_message())?;
            }
        }
        Ok(())
    }
}
