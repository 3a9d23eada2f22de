use crate::cache::{CacheManager, RefreshMode};
use crate::config::{Config, StoreBackend};
use crate::payload::Payload;
use crate::services::manager::ServiceManager;
use crate::services::poller::PollerService;
use crate::services::web::WebService;
use crate::state::{AppState, ServiceStatusRegistry};
use crate::store::{MemoryStore, PgStore, RecordStore};
use crate::utils::fmt_duration;
use crate::weather::models::Current;
use crate::weather::{DataSource, OpenWeatherClient};
use crate::web::request_timeout;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Wire collaborators together and warm the cache.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let store = Self::create_store(&config).await?;

        let source: Arc<dyn DataSource> = Arc::new(
            OpenWeatherClient::new(config.upstream_settings())
                .context("Failed to create weather client")?,
        );

        let mode = if config.use_mock_data {
            info!("Using mock weather data, upstream will not be called");
            RefreshMode::Override(mock_payload()?)
        } else {
            if config.open_weather_api_key.is_empty() {
                warn!("OPEN_WEATHER_API_KEY is not set, upstream requests will be rejected");
            }
            RefreshMode::Live
        };

        let durable = config.store == StoreBackend::Postgres;
        let cache = Arc::new(CacheManager::new(source, store, mode));

        // Warm the cache before the server binds. A memory store has nothing
        // to serve without this; a durable store still has the last record.
        match cache.pre_fetch().await {
            Ok(()) => {}
            Err(e) if durable => {
                warn!(stage = e.stage(), error = ?e, "Initial weather fetch failed, serving last stored record");
            }
            Err(e) => return Err(e).context("Initial weather fetch failed"),
        }

        let statuses = ServiceStatusRegistry::new();
        let app_state = AppState::new(cache, statuses.clone())
            .with_request_timeout(request_timeout(config.upstream_timeout));

        Ok(App {
            config,
            app_state,
            service_manager: ServiceManager::new(statuses),
        })
    }

    async fn create_store(config: &Config) -> Result<Arc<dyn RecordStore>, anyhow::Error> {
        match config.store {
            StoreBackend::Memory => {
                info!("Using in-memory record store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required when STORE=postgres")?;

                let pool = PgPoolOptions::new()
                    .min_connections(0)
                    .max_connections(4)
                    .acquire_timeout(Duration::from_secs(4))
                    .idle_timeout(Duration::from_secs(60 * 2))
                    .connect(url)
                    .await
                    .context("Failed to create database pool")?;

                let store = PgStore::new(pool);
                store
                    .migrate()
                    .await
                    .context("Failed to run database migrations")?;
                info!(max_connections = 4, "Using Postgres record store");
                Ok(Arc::new(store))
            }
        }
    }

    /// Register the poller (if enabled) and the web server. The poller is
    /// registered first so it stops before the listener closes.
    pub fn setup_services(&mut self) -> Result<(), anyhow::Error> {
        if self.config.poll_interval.is_zero() {
            info!("POLL_INTERVAL is 0, background refresh disabled");
        } else {
            self.service_manager.register_service(Box::new(PollerService::new(
                self.app_state.cache.clone(),
                self.config.poll_interval,
            )));
        }

        self.service_manager.register_service(Box::new(WebService::new(
            self.config.port,
            self.app_state.clone(),
        )));

        if !self.service_manager.has_services() {
            anyhow::bail!("No services enabled");
        }

        info!(
            port = self.config.port,
            poll_interval = fmt_duration(self.config.poll_interval),
            shutdown_timeout = fmt_duration(self.config.shutdown_timeout),
            "services configured"
        );
        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        use crate::services::signals::handle_shutdown_signals;
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}

/// The fixed record served in mock mode.
fn mock_payload() -> Result<Payload, anyhow::Error> {
    let body = serde_json::to_vec(&Current::mock()).context("Failed to encode mock weather")?;
    Ok(Payload::from(body))
}
