//! Tests for `PgVersionStore`.
//!
//! Tests marked `#[ignore]` need a disposable PostgreSQL database named by
//! `PMG_TEST_DATABASE_URL`; run them with `cargo test -- --ignored`.

use pmg_core::{
  config::DatabaseConfig,
  store::{VersionStore, get_stored_version},
};
use sqlx::postgres::PgPoolOptions;

use crate::{Error, PgVersionStore};

fn config(engine: &str, port: u16) -> DatabaseConfig {
  DatabaseConfig {
    engine:   engine.into(),
    host:     "127.0.0.1".into(),
    port,
    user:     "portal".into(),
    password: "portal".into(),
    name:     "portal".into(),
  }
}

async fn live_store() -> PgVersionStore {
  let url = std::env::var("PMG_TEST_DATABASE_URL")
    .expect("PMG_TEST_DATABASE_URL must be set for ignored tests");
  let pool = PgPoolOptions::new()
    .max_connections(1)
    .connect(&url)
    .await
    .expect("connect to test database");
  let store = PgVersionStore::from_pool(pool);
  store.init_schema().await.expect("init schema");
  store
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn non_postgres_engine_is_rejected() {
  let err = PgVersionStore::open_lazy(&config("sqlite3", 5432)).unwrap_err();
  assert!(matches!(err, Error::Core(pmg_core::Error::UnsupportedEngine(_))));
}

#[tokio::test]
async fn unreachable_database_reads_as_no_version() {
  // Nothing listens on port 1.
  let store = PgVersionStore::open_lazy(&config("postgresql", 1)).unwrap();
  assert!(store.stored_version().await.is_err());
  assert_eq!(get_stored_version(&store).await, None);
}

// ─── Live database ───────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires PMG_TEST_DATABASE_URL"]
async fn upsert_is_idempotent_and_readable() {
  let store = live_store().await;

  store.set_stored_version(Some("5.0.0")).await.unwrap();
  store.set_stored_version(Some("5.0.0")).await.unwrap();
  assert_eq!(get_stored_version(&store).await.as_deref(), Some("5.0.0"));

  store.set_stored_version(Some("5.1.0-beta.1")).await.unwrap();
  assert_eq!(
    get_stored_version(&store).await.as_deref(),
    Some("5.1.0-beta.1")
  );

  store.set_stored_version(None).await.unwrap();
  assert_eq!(store.stored_version().await.unwrap().as_deref(), Some(""));
  assert_eq!(get_stored_version(&store).await, None);

  let rows: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM portal_systeminfo WHERE key = 'app_version'",
  )
  .fetch_one(&store.pool)
  .await
  .unwrap();
  assert_eq!(rows, 1);
}

#[tokio::test]
#[ignore = "requires PMG_TEST_DATABASE_URL"]
async fn init_schema_can_run_twice() {
  let store = live_store().await;
  store.init_schema().await.unwrap();
}
