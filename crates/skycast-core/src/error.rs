//! Application-level error types.
//!
//! Library crates keep their own error enums; this module covers what the
//! front-end needs to report startup and configuration failures.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a message suitable for the terminal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a short, non-technical message.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory unavailable")]
    NoConfigDir,

    #[error("Failed to read configuration: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write configuration: {0}")]
    Write(#[source] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "Could not locate a configuration directory.",
            ConfigError::Read(_) | ConfigError::Write(_) => {
                "Configuration file is not accessible. Check permissions."
            }
            ConfigError::Parse(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Serialize(_) => "Configuration could not be saved.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let config_err = ConfigError::Invalid("retry.backoff_secs".into());
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Config(ConfigError::NoConfigDir);
        assert_eq!(
            app_err.user_message(),
            "Could not locate a configuration directory."
        );
    }

    #[test]
    fn test_parse_error_display() {
        let parse_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err = ConfigError::from(parse_err);
        assert!(err.to_string().starts_with("Configuration parse error"));
    }
}
