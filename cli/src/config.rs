use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracker::{
    Coordinates, HistoryMode, MapStyle, PollerConfig,
    poller::{DEFAULT_CENTER, DEFAULT_HISTORY_CAPACITY, DEFAULT_INTERVAL},
    source::DEFAULT_BASE_URL,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub poller: PollerSettings,
    pub map: MapStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL the `/latest` and `/all` routes are appended to.
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySetting {
    Rolling,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub interval_ms: u64,
    pub history: HistorySetting,
    /// Only used by the rolling history.
    pub history_capacity: usize,
    pub initial_latitude: f64,
    pub initial_longitude: f64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            history: HistorySetting::Rolling,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            initial_latitude: DEFAULT_CENTER.latitude,
            initial_longitude: DEFAULT_CENTER.longitude,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Environment variables use the `TRACKER_` prefix and `__` between
    /// nested keys, e.g. `TRACKER_API__BASE_URL`.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRACKER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.poller.interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "poller.interval_ms must be greater than zero".into(),
            ));
        }

        if self.poller.history == HistorySetting::Rolling && self.poller.history_capacity == 0 {
            return Err(config::ConfigError::Message(
                "poller.history_capacity must be greater than zero".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.map.history_opacity) {
            return Err(config::ConfigError::Message(
                "map.history_opacity must be between 0 and 1".into(),
            ));
        }

        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        let mode = match self.poller.history {
            HistorySetting::Rolling => HistoryMode::Rolling {
                capacity: self.poller.history_capacity,
            },
            HistorySetting::Full => HistoryMode::Full,
        };

        PollerConfig {
            interval: Duration::from_millis(self.poller.interval_ms),
            mode,
            initial: Coordinates::new(self.poller.initial_latitude, self.poller.initial_longitude),
        }
    }
}

impl ApiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_api() {
        let config = Config::default();
        let poller = config.poller_config();

        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(poller.interval, Duration::from_millis(5000));
        assert_eq!(poller.mode, HistoryMode::Rolling { capacity: 10 });
        assert_eq!(config.map.zoom, 13);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_history_ignores_capacity() {
        let mut config = Config::default();
        config.poller.history = HistorySetting::Full;
        config.poller.history_capacity = 0;

        assert!(config.validate().is_ok());
        assert_eq!(config.poller_config().mode, HistoryMode::Full);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.poller.interval_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [api]
                base_url = "http://localhost:8080/api/gps"

                [poller]
                interval_ms = 2000
                history = "full"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8080/api/gps");
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.poller.history, HistorySetting::Full);
        assert_eq!(config.poller_config().interval, Duration::from_secs(2));
        assert_eq!(config.map.history_opacity, 0.5);
    }
}
