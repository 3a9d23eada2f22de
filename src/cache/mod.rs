//! Refresh lifecycle for the cached weather record.
//!
//! [`CacheManager`] is the single authority for what the current record is and
//! when it was last refreshed. A refresh is fetch -> validate -> store; the
//! store either receives the whole new record or is left untouched, so the
//! last good value stays servable through upstream outages.
//!
//! ## Poll loop
//!
//! `start_poll` spawns one tokio task that refreshes every interval. The task
//! owns nothing but an `Arc` of the refresh core and a [`CancellationToken`];
//! the manager keeps the token and the `JoinHandle` so `stop_poll` can cancel
//! and then wait, guaranteeing no tick runs after it returns. A tick already
//! inside a refresh is allowed to finish.
//!
//! Concurrent refreshes (a tick overlapping a manual trigger) are not
//! serialized. Both write whole records, so the later write wins and readers
//! never observe a partial one.

use crate::payload::Payload;
use crate::store::{LOCATION_KEY, RecordStore, StoreError};
use crate::utils::fmt_duration;
use crate::weather::json::{DecodeError, decode_with_context};
use crate::weather::models::Current;
use crate::weather::{DataSource, FetchError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where refreshed records come from.
#[derive(Debug, Clone)]
pub enum RefreshMode {
    /// Fetch from the [`DataSource`] on every refresh.
    Live,
    /// Always write this record; the data source is never called.
    Override(Payload),
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::Live => "live",
            RefreshMode::Override(_) => "override",
        }
    }
}

/// A refresh failed; the variant names the stage.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("fetching current weather failed")]
    Fetch(#[from] FetchError),
    #[error("upstream weather payload is malformed")]
    Decode(#[from] DecodeError),
    #[error("storing weather record failed")]
    Store(#[from] StoreError),
}

impl RefreshError {
    pub fn stage(&self) -> &'static str {
        match self {
            RefreshError::Fetch(FetchError::Body(_)) => "read",
            RefreshError::Fetch(_) => "fetch",
            RefreshError::Decode(_) => "decode",
            RefreshError::Store(_) => "store",
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("poll interval {0:?} is too large to schedule")]
    IntervalTooLarge(Duration),
}

/// Snapshot of the manager's refresh bookkeeping for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub mode: &'static str,
    pub backend: &'static str,
    pub polling: bool,
    pub poll_interval_secs: Option<f64>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub refreshes: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct RefreshLog {
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    refreshes: u64,
    failures: u64,
}

/// Everything a refresh needs; shared between the manager and its poll task.
struct RefreshCore {
    source: Arc<dyn DataSource>,
    store: Arc<dyn RecordStore>,
    mode: RefreshMode,
    log: Mutex<RefreshLog>,
}

impl RefreshCore {
    async fn refresh(&self) -> Result<(), RefreshError> {
        let start = Instant::now();
        let result = self.fetch_and_store().await;

        let mut log = lock(&self.log);
        match &result {
            Ok(bytes) => {
                log.last_success = Some(Utc::now());
                log.last_error = None;
                log.refreshes += 1;
                debug!(
                    mode = self.mode.as_str(),
                    bytes,
                    duration = fmt_duration(start.elapsed()),
                    "Weather record refreshed"
                );
            }
            Err(e) => {
                log.last_error = Some(format!("{}: {}", e.stage(), error_chain(e)));
                log.failures += 1;
            }
        }
        result.map(|_| ())
    }

    async fn fetch_and_store(&self) -> Result<usize, RefreshError> {
        let payload = match &self.mode {
            RefreshMode::Override(payload) => payload.clone(),
            RefreshMode::Live => {
                let payload = self.source.fetch().await?;
                // Validate before writing so a bad body never replaces a good record.
                decode_with_context::<Current>(payload.as_bytes())?;
                payload
            }
        };
        let bytes = payload.len();
        self.store.put(LOCATION_KEY, payload).await?;
        Ok(bytes)
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(e: &RefreshError) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The running poll loop.
struct PollHandle {
    interval: Duration,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the refresh collaborators and the periodic poll loop.
pub struct CacheManager {
    core: Arc<RefreshCore>,
    poll: Mutex<Option<PollHandle>>,
}

impl CacheManager {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn RecordStore>,
        mode: RefreshMode,
    ) -> Self {
        Self {
            core: Arc::new(RefreshCore {
                source,
                store,
                mode,
                log: Mutex::new(RefreshLog::default()),
            }),
            poll: Mutex::new(None),
        }
    }

    /// Fetch (or take the override), validate, and replace the stored record.
    ///
    /// Dropping the returned future before it completes leaves the store
    /// untouched unless the write had already finished.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        self.core.refresh().await
    }

    /// One synchronous refresh, run before the HTTP server starts accepting
    /// traffic. Whether a failure is fatal is the caller's call.
    pub async fn pre_fetch(&self) -> Result<(), RefreshError> {
        let start = Instant::now();
        self.core.refresh().await?;
        info!(
            mode = self.core.mode.as_str(),
            duration = fmt_duration(start.elapsed()),
            "Initial weather record cached"
        );
        Ok(())
    }

    /// Read the cached record. [`StoreError::NotFound`] until the first
    /// successful refresh.
    pub async fn get_current(&self, key: &str) -> Result<Payload, StoreError> {
        self.core.store.get(key).await
    }

    /// Start refreshing every `interval`, replacing any loop already running.
    ///
    /// Returns immediately; the first refresh happens one interval from now.
    /// Must be called from within a tokio runtime.
    pub fn start_poll(&self, interval: Duration) -> Result<(), PollError> {
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }
        let first_tick = time::Instant::now()
            .checked_add(interval)
            .ok_or(PollError::IntervalTooLarge(interval))?;

        let mut slot = lock(&self.poll);
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
            debug!(
                previous = fmt_duration(previous.interval),
                "Replacing running poll loop"
            );
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.core.clone(),
            first_tick,
            interval,
            cancel.clone(),
        ));
        *slot = Some(PollHandle {
            interval,
            cancel,
            task,
        });

        info!(interval = fmt_duration(interval), "Weather poll loop started");
        Ok(())
    }

    /// Stop the poll loop and wait for it to exit. No-op when not running.
    ///
    /// A refresh already in progress is allowed to finish; no tick starts
    /// after this returns.
    pub async fn stop_poll(&self) {
        let handle = lock(&self.poll).take();
        let Some(handle) = handle else {
            debug!("Poll loop not running, nothing to stop");
            return;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            error!(error = ?e, "Poll loop task ended abnormally");
        }
        info!("Weather poll loop stopped");
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poll).is_some()
    }

    pub fn status(&self) -> CacheStatus {
        let interval = lock(&self.poll).as_ref().map(|h| h.interval);
        let log = lock(&self.core.log);
        CacheStatus {
            mode: self.core.mode.as_str(),
            backend: self.core.store.backend(),
            polling: interval.is_some(),
            poll_interval_secs: interval.map(|d| d.as_secs_f64()),
            last_refreshed_at: log.last_success,
            last_error: log.last_error.clone(),
            refreshes: log.refreshes,
            failures: log.failures,
        }
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.poll).take() {
            handle.cancel.cancel();
        }
    }
}

async fn poll_loop(
    core: Arc<RefreshCore>,
    first_tick: time::Instant,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Cancellation wins a tie with a tick.
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = core.refresh().await {
                    match &e {
                        RefreshError::Fetch(fetch) if fetch.is_transient() => {
                            warn!(stage = e.stage(), error = ?e, "Scheduled weather refresh failed, keeping previous record");
                        }
                        _ => {
                            error!(stage = e.stage(), error = ?e, "Scheduled weather refresh failed, keeping previous record");
                        }
                    }
                }
            }
        }
    }

    debug!("Poll loop exited");
}
