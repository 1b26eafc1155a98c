pub mod config;
pub mod error;

pub use config::{
    CacheConfig, Config, NotificationConfig, ProviderConfig, RetryConfig, UsersConfig,
    ValidationResult,
};
pub use error::{AppError, ConfigError};

use anyhow::Result;

/// Initialize logging for the application.
///
/// Logs go to stderr so they never interleave with interactive output.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Skycast core initialized");
    Ok(())
}
