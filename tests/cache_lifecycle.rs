//! Refresh and poll-loop behavior of the cache manager.

mod helpers;

use helpers::{FakeSource, Reply, live_manager, temp_of};
use std::sync::Arc;
use std::time::Duration;
use weathercache::cache::{CacheManager, RefreshError, RefreshMode};
use weathercache::payload::Payload;
use weathercache::store::{LOCATION_KEY, MemoryStore, StoreError};
use weathercache::weather::FetchError;

#[tokio::test]
async fn get_before_any_refresh_is_not_found() {
    let manager = live_manager(&FakeSource::with_temp(72.5));
    let err = manager.get_current(LOCATION_KEY).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "got {err:?}");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn refresh_stores_exact_fetched_bytes() {
    let body = r#"{"main":{"temp":72.5},  "name":"New Orleans"}"#;
    let manager = live_manager(&FakeSource::returning(body));

    manager.refresh().await.unwrap();

    let got = manager.get_current(LOCATION_KEY).await.unwrap();
    assert_eq!(got.as_bytes(), body.as_bytes());
}

#[tokio::test]
async fn prefetch_then_poll_picks_up_new_data() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);

    manager.pre_fetch().await.unwrap();
    assert_eq!(temp_of(&manager.get_current(LOCATION_KEY).await.unwrap()), 72.5);

    source.set_temp(86.5);
    manager.start_poll(Duration::from_millis(100)).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(temp_of(&manager.get_current(LOCATION_KEY).await.unwrap()), 86.5);
    manager.stop_poll().await;
}

#[tokio::test]
async fn override_is_stored_and_source_never_called() {
    let source = FakeSource::failing(500);
    let manager = CacheManager::new(
        Arc::new(source.clone()),
        Arc::new(MemoryStore::new()),
        RefreshMode::Override(Payload::from(r#"{"base":"stations"}"#)),
    );

    manager.pre_fetch().await.unwrap();
    manager.refresh().await.unwrap();

    let got = manager.get_current(LOCATION_KEY).await.unwrap();
    assert_eq!(got.as_bytes(), br#"{"base":"stations"}"#);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn failed_tick_keeps_last_good_record() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);
    manager.pre_fetch().await.unwrap();

    source.set(Reply::Status(503));
    manager.start_poll(Duration::from_millis(50)).unwrap();
    tokio::time::sleep(Duration::from_millis(180)).await;
    manager.stop_poll().await;

    assert!(source.calls() >= 3, "poll loop should keep trying after failures");
    assert_eq!(temp_of(&manager.get_current(LOCATION_KEY).await.unwrap()), 72.5);
    let status = manager.status();
    assert!(status.failures >= 2);
    assert!(status.last_error.unwrap().starts_with("fetch: "));
}

#[tokio::test]
async fn malformed_payload_never_replaces_good_record() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);
    manager.pre_fetch().await.unwrap();

    source.set(Reply::Body(r#"{"main":{"temp":"#.into()));
    let err = manager.refresh().await.unwrap_err();
    assert!(matches!(err, RefreshError::Decode(_)), "got {err:?}");

    assert_eq!(temp_of(&manager.get_current(LOCATION_KEY).await.unwrap()), 72.5);
}

#[tokio::test]
async fn manual_refresh_surfaces_upstream_errors() {
    let manager = live_manager(&FakeSource::failing(401));
    let err = manager.pre_fetch().await.unwrap_err();
    assert!(
        matches!(err, RefreshError::Fetch(FetchError::UpstreamStatus { status: 401, .. })),
        "got {err:?}"
    );
    assert_eq!(err.stage(), "fetch");
}

#[tokio::test]
async fn stop_poll_prevents_further_ticks() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);
    let interval = Duration::from_millis(50);

    manager.start_poll(interval).unwrap();
    tokio::time::sleep(Duration::from_millis(130)).await;
    manager.stop_poll().await;
    let after_stop = source.calls();
    assert!(after_stop >= 1);

    tokio::time::sleep(interval * 3).await;
    assert_eq!(source.calls(), after_stop);
    assert!(!manager.is_polling());
}

#[tokio::test]
async fn stop_poll_waits_for_in_flight_tick() {
    let source = FakeSource::with_temp(72.5).with_latency(Duration::from_millis(200));
    let manager = live_manager(&source);

    manager.start_poll(Duration::from_millis(30)).unwrap();
    // First tick fires at 30ms and is still fetching when we stop.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.calls(), 1);
    manager.stop_poll().await;

    let stored = manager.get_current(LOCATION_KEY).await.unwrap();
    assert_eq!(temp_of(&stored), 72.5);
    assert_eq!(manager.status().refreshes, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn start_poll_twice_replaces_the_loop() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);
    let interval = Duration::from_millis(100);

    manager.start_poll(interval).unwrap();
    manager.start_poll(interval).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    manager.stop_poll().await;

    // One loop ticks 3 times in 350ms; two stacked loops would tick 6.
    let calls = source.calls();
    assert!((2..=4).contains(&calls), "expected ~3 ticks, got {calls}");
}

#[tokio::test]
async fn stop_poll_is_idempotent_and_restartable() {
    let source = FakeSource::with_temp(72.5);
    let manager = live_manager(&source);

    manager.stop_poll().await;
    manager.start_poll(Duration::from_millis(40)).unwrap();
    manager.stop_poll().await;
    manager.stop_poll().await;
    assert!(!manager.is_polling());

    manager.start_poll(Duration::from_millis(40)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.stop_poll().await;
    assert!(source.calls() >= 1);
}

#[tokio::test]
async fn concurrent_refreshes_leave_a_whole_record() {
    let source = FakeSource::with_temp(72.5);
    let manager = Arc::new(live_manager(&source));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.refresh().await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(temp_of(&manager.get_current(LOCATION_KEY).await.unwrap()), 72.5);
    assert_eq!(manager.status().refreshes, 8);
}
