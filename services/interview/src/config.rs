//! Application Configuration Module
//!
//! Loads settings for the terminal interview client from environment
//! variables (and a `.env` file, if present).

use interview_core::speech_output::NarrationConfig;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Backend used by `proxy` mode when no URL is given.
pub const LOCAL_BACKEND_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    /// Local development backend.
    Proxy,
    /// A deployed backend at an explicit URL.
    Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_mode: ApiMode,
    pub backend_url: String,
    pub narration: NarrationConfig,
    pub recognition_restart: Duration,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTERVIEW_API_MODE`: (Optional) "proxy" or "remote". Defaults to "proxy".
    // *   `INTERVIEW_BACKEND_URL`: Backend base URL. Required in remote mode.
    // *   `NARRATION_DELAY_MS`, `NARRATION_RATE`, `NARRATION_LANG`, `AUTO_NARRATE`: (Optional) narration tuning.
    // *   `RECOGNITION_RESTART_MS`: (Optional) How often speech recognition is cycled. Defaults to 10000.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_mode = match var("INTERVIEW_API_MODE")
            .unwrap_or_else(|| "proxy".to_string())
            .to_lowercase()
            .as_str()
        {
            "proxy" | "development" => ApiMode::Proxy,
            "remote" | "production" => ApiMode::Remote,
            _ => {
                return Err(ConfigError::InvalidValue {
                    var: "INTERVIEW_API_MODE",
                    value: var("INTERVIEW_API_MODE").unwrap_or_default(),
                });
            }
        };

        let backend_url = match (api_mode, var("INTERVIEW_BACKEND_URL")) {
            (_, Some(url)) if !url.trim().is_empty() => url.trim().to_string(),
            (ApiMode::Proxy, _) => LOCAL_BACKEND_URL.to_string(),
            (ApiMode::Remote, _) => {
                return Err(ConfigError::MissingVar(
                    "INTERVIEW_BACKEND_URL must be set in remote mode".to_string(),
                ));
            }
        };

        let defaults = NarrationConfig::default();
        let narration = NarrationConfig {
            lang: var("NARRATION_LANG").unwrap_or(defaults.lang),
            rate: parse_or(&var, "NARRATION_RATE", defaults.rate)?,
            pitch: defaults.pitch,
            delay: Duration::from_millis(parse_or(
                &var,
                "NARRATION_DELAY_MS",
                defaults.delay.as_millis() as u64,
            )?),
            auto_narrate: parse_or(&var, "AUTO_NARRATE", defaults.auto_narrate)?,
        };
        if !(0.1..=10.0).contains(&narration.rate) {
            return Err(ConfigError::InvalidValue {
                var: "NARRATION_RATE",
                value: narration.rate.to_string(),
            });
        }

        let restart_ms: u64 = parse_or(&var, "RECOGNITION_RESTART_MS", 10_000)?;
        if restart_ms == 0 {
            return Err(ConfigError::InvalidValue {
                var: "RECOGNITION_RESTART_MS",
                value: restart_ms.to_string(),
            });
        }

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_mode,
            backend_url,
            narration,
            recognition_restart: Duration::from_millis(restart_ms),
            log_level,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_target_the_local_backend() {
        let config = load(&[]).unwrap();

        assert_eq!(config.api_mode, ApiMode::Proxy);
        assert_eq!(config.backend_url, LOCAL_BACKEND_URL);
        assert_eq!(config.narration.lang, "en-US");
        assert_eq!(config.narration.rate, 0.9);
        assert_eq!(config.narration.delay, Duration::from_millis(500));
        assert!(config.narration.auto_narrate);
        assert_eq!(config.recognition_restart, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn remote_mode_requires_a_backend_url() {
        assert!(matches!(
            load(&[("INTERVIEW_API_MODE", "remote")]),
            Err(ConfigError::MissingVar(_))
        ));

        let config = load(&[
            ("INTERVIEW_API_MODE", "Remote"),
            ("INTERVIEW_BACKEND_URL", "https://interview.example.com"),
        ])
        .unwrap();
        assert_eq!(config.api_mode, ApiMode::Remote);
        assert_eq!(config.backend_url, "https://interview.example.com");
    }

    #[test]
    fn narration_settings_are_read() {
        let config = load(&[
            ("NARRATION_DELAY_MS", "250"),
            ("NARRATION_RATE", "1.2"),
            ("NARRATION_LANG", "en-GB"),
            ("AUTO_NARRATE", "false"),
            ("RECOGNITION_RESTART_MS", "8000"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.narration.delay, Duration::from_millis(250));
        assert_eq!(config.narration.rate, 1.2);
        assert_eq!(config.narration.lang, "en-GB");
        assert!(!config.narration.auto_narrate);
        assert_eq!(config.recognition_restart, Duration::from_millis(8000));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (var, value) in [
            ("INTERVIEW_API_MODE", "staging"),
            ("NARRATION_DELAY_MS", "soon"),
            ("NARRATION_RATE", "0"),
            ("AUTO_NARRATE", "sometimes"),
            ("RECOGNITION_RESTART_MS", "0"),
        ] {
            match load(&[(var, value)]) {
                Err(ConfigError::InvalidValue { var: named, .. }) => assert_eq!(named, var),
                other => panic!("{var}={value} should be rejected, got {other:?}"),
            }
        }

        assert!(matches!(
            load(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
