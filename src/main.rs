//! Skycast: current weather, forecasts, air quality and rain alerts from the
//! terminal.

mod app;
mod display;
mod notifier;
mod repl;

use anyhow::Result;
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use skycast_core::{AppError, Config};
use skycast_weather::{utc_tomorrow, Coordinates, LocationQuery};

use crate::app::{report_error, App};
use crate::repl::Repl;

#[derive(Parser)]
#[command(name = "skycast", version, about = "Weather lookups with retries and an offline fallback")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive menu (default)
    Repl,
    /// Current weather for a city
    Weather { city: String },
    /// 5-day forecast summarized per day
    Forecast {
        city: String,
        /// Every 3-hour step of one date instead (YYYY-MM-DD)
        #[arg(long)]
        day: Option<NaiveDate>,
    },
    /// Current temperature, feels-like and humidity of two cities
    Compare { first: String, second: String },
    /// Current weather in full plus the air quality level
    Details { city: String },
    /// Air quality analysis
    Air { city: String },
    /// Run the notification sweep every configured interval
    Watch {
        /// Sweep once right away and exit
        #[arg(long)]
        once: bool,
    },
    /// Enable notifications for a user at a location
    Subscribe {
        user_id: i64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
    /// Disable notifications for a user
    Unsubscribe { user_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skycast_core::init()?;

    let cli = Cli::parse();
    let (config, _validation) = Config::load_validated().map_err(|e| {
        let err = AppError::from(e);
        let message = err.user_message();
        anyhow::Error::new(err).context(message)
    })?;
    let app = App::from_config(config)?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            let stdin = std::io::stdin();
            Repl::new(&app, stdin.lock(), std::io::stdout()).run().await?;
        }
        Command::Weather { city } => {
            let report = app
                .weather_report(&LocationQuery::city(city))
                .await
                .map_err(report_error)?;
            println!("{}", report);
        }
        Command::Forecast { city, day } => {
            let report = match day {
                Some(date) => app.day_details_report(&city, date).await,
                None => app.forecast_report(&city).await,
            };
            println!("{}", report.map_err(report_error)?);
        }
        Command::Compare { first, second } => {
            let report = app.compare_report(&first, &second).await.map_err(report_error)?;
            println!("{}", report);
        }
        Command::Details { city } => {
            let report = app.extended_report(&city).await.map_err(report_error)?;
            println!("{}", report);
        }
        Command::Air { city } => {
            let report = app.air_report(&city).await.map_err(report_error)?;
            println!("{}", report);
        }
        Command::Watch { once } => {
            let sweep = app.notification_sweep().map_err(report_error)?;
            if once {
                let now = Utc::now();
                let rain_day = utc_tomorrow(now)
                    .ok_or_else(|| anyhow::anyhow!("No calendar day after {}", now))?;
                sweep
                    .run_once(now.with_timezone(&Local).date_naive(), rain_day)
                    .await;
            } else {
                sweep.run(app.sweep_interval()).await;
            }
        }
        Command::Subscribe { user_id, lat, lon } => {
            app.users.set_location(user_id, Coordinates::new(lat, lon));
            app.users.set_subscription(user_id, true);
            println!("Notifications enabled for user {}.", user_id);
        }
        Command::Unsubscribe { user_id } => {
            app.users.set_subscription(user_id, false);
            println!("Notifications disabled for user {}.", user_id);
        }
    }

    Ok(())
}
