//! Process configuration, read from the environment.
//!
//! Keys are matched case-insensitively against field names (`PORT` -> `port`).
//! Durations accept plain seconds (`30`) or unit suffixes (`500ms`, `10m`).

use crate::weather::client::UpstreamSettings;
use anyhow::Context;
use figment::Figment;
use figment::providers::Env;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Grace period for draining HTTP connections on shutdown.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Zero disables the background poll loop.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,
    #[serde(default = "default_store")]
    pub store: StoreBackend,
    pub database_url: Option<String>,
    /// Serve a fixed mock record instead of calling the weather API.
    #[serde(default)]
    pub use_mock_data: bool,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub open_weather_api_key: String,
    #[serde(default = "default_base_url")]
    pub open_weather_base_url: String,
    /// Env values that look numeric arrive as integers.
    #[serde(default = "default_zip", deserialize_with = "deserialize_text")]
    pub weather_zip: String,
    #[serde(default = "default_units")]
    pub weather_units: String,
    #[serde(
        default = "default_upstream_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub upstream_timeout: Duration,
}

fn default_port() -> u16 {
    9876
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_store() -> StoreBackend {
    StoreBackend::Memory
}

fn default_base_url() -> String {
    UpstreamSettings::default().base_url
}

fn default_zip() -> String {
    UpstreamSettings::default().zip
}

fn default_units() -> String {
    UpstreamSettings::default().units
}

fn default_upstream_timeout() -> Duration {
    UpstreamSettings::default().timeout
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract().context("Failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.store == StoreBackend::Postgres && self.database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when STORE=postgres");
        }
        if self.upstream_timeout.is_zero() {
            anyhow::bail!("UPSTREAM_TIMEOUT must be greater than zero");
        }
        Ok(())
    }

    pub fn upstream_settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            base_url: self.open_weather_base_url.clone(),
            api_key: self.open_weather_api_key.clone(),
            zip: self.weather_zip.clone(),
            units: self.weather_units.clone(),
            timeout: self.upstream_timeout,
        }
    }
}

/// Accepts integer seconds or a `fundu` duration string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as `30`, `500ms`, or `10m`")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            let parsed = fundu::DurationParser::with_all_time_units()
                .parse(v.trim())
                .map_err(|e| E::custom(format!("invalid duration {v:?}: {e}")))?;
            Duration::try_from(parsed).map_err(|e| E::custom(format!("invalid duration {v:?}: {e}")))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

/// Accepts a string or a bare integer, keeping the integer's digits.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct TextVisitor;

    impl Visitor<'_> for TextVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}
