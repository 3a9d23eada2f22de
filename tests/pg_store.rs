//! `PgStore` against a throwaway database per test (requires `DATABASE_URL`).

use sqlx::PgPool;
use weathercache::payload::Payload;
use weathercache::store::{LOCATION_KEY, PgStore, RecordStore, StoreError};

#[sqlx::test(migrations = "./migrations")]
async fn get_on_empty_table_is_not_found(pool: PgPool) {
    let store = PgStore::new(pool);

    let err = store.get(LOCATION_KEY).await.unwrap_err();
    match err {
        StoreError::NotFound { key } => assert_eq!(key, LOCATION_KEY),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn put_then_get_returns_exact_bytes(pool: PgPool) {
    let store = PgStore::new(pool);
    let body = r#"{"main":{"temp":72.5},"name":"New Orleans"}"#;

    store.put(LOCATION_KEY, Payload::from(body)).await.unwrap();

    let got = store.get(LOCATION_KEY).await.unwrap();
    assert_eq!(got.as_bytes(), body.as_bytes());
    assert_eq!(store.backend(), "postgres");
}

#[sqlx::test(migrations = "./migrations")]
async fn put_replaces_whole_record(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    store
        .put(LOCATION_KEY, Payload::from(r#"{"main":{"temp":72.5},"base":"stations"}"#))
        .await
        .unwrap();
    store
        .put(LOCATION_KEY, Payload::from(r#"{"main":{"temp":86.5}}"#))
        .await
        .unwrap();

    let got = store.get(LOCATION_KEY).await.unwrap();
    assert_eq!(got.as_bytes(), br#"{"main":{"temp":86.5}}"#);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weather_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = false)]
async fn migrate_creates_records_table(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    store.migrate().await.unwrap();
    // Running again is a no-op.
    store.migrate().await.unwrap();

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'weather_records')",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(exists);
}

#[sqlx::test(migrations = "./migrations")]
async fn keys_are_independent(pool: PgPool) {
    let store = PgStore::new(pool);

    store.put(LOCATION_KEY, Payload::from("{}")).await.unwrap();

    assert!(store.get("70130").await.unwrap_err().is_not_found());
    assert!(store.get(LOCATION_KEY).await.is_ok());
}
