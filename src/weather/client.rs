//! OpenWeather "current weather" client.

use super::{DataSource, FetchError};
use crate::payload::Payload;
use crate::utils::{fmt_duration, log_if_slow};
use anyhow::Context;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const SLOW_FETCH_THRESHOLD: Duration = Duration::from_secs(2);

/// Upstream error bodies are kept for logs; cap them so a misbehaving proxy
/// can't flood the log line.
const MAX_ERROR_BODY: usize = 512;

/// Where and what to ask the weather API for.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: String,
    pub zip: String,
    pub units: String,
    pub timeout: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            zip: "70116".to_string(),
            units: "imperial".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches the current weather for one zip code.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    endpoint: String,
    settings: UpstreamSettings,
}

impl OpenWeatherClient {
    pub fn new(settings: UpstreamSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("weathercache/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build weather HTTP client")?;
        let endpoint = format!("{}/weather", settings.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            settings,
        })
    }
}

#[async_trait]
impl DataSource for OpenWeatherClient {
    async fn fetch(&self) -> Result<Payload, FetchError> {
        let start = Instant::now();

        // `without_url` keeps the API key (a query param) out of error messages.
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("zip", self.settings.zip.as_str()),
                ("appid", self.settings.api_key.as_str()),
                ("units", self.settings.units.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e.without_url()));
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(FetchError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.without_url()))?;

        log_if_slow(start, SLOW_FETCH_THRESHOLD, "weather fetch");
        debug!(
            bytes = body.len(),
            duration = fmt_duration(start.elapsed()),
            "Fetched current weather"
        );
        Ok(Payload::from(body))
    }
}
