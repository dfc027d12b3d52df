//! [`PgVersionStore`], the PostgreSQL implementation of [`VersionStore`].

use std::time::Duration;

use pmg_core::{
  config::DatabaseConfig,
  store::{VERSION_KEY, VersionStore, stored_value},
};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::{
  Error, Result,
  schema::{SCHEMA, SELECT_VALUE, UPSERT_VALUE},
};

const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The version record, stored in the portal's primary database.
///
/// Cloning is cheap; the inner pool is reference-counted.
#[derive(Clone, Debug)]
pub struct PgVersionStore {
  pub(crate) pool: PgPool,
}

impl PgVersionStore {
  /// Build a store without touching the network.
  ///
  /// Connections are established on first use, so an unreachable database
  /// surfaces as a query error rather than a startup failure. The version
  /// table is never created here; it belongs to the portal's migrations.
  pub fn open_lazy(config: &DatabaseConfig) -> Result<Self> {
    config.check_engine()?;
    let pool = pool_options().connect_lazy_with(connect_options(config));
    Ok(Self { pool })
  }

  /// Wrap an existing pool.
  pub fn from_pool(pool: PgPool) -> Self { Self { pool } }

  /// Create the version table if it is missing. Only for databases the
  /// portal's migrations never ran against, such as a scratch test database.
  pub async fn init_schema(&self) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
    Ok(())
  }

  pub async fn close(&self) { self.pool.close().await; }
}

fn pool_options() -> PgPoolOptions {
  PgPoolOptions::new()
    .max_connections(MAX_CONNECTIONS)
    .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connection options from discrete fields; the password never passes
/// through a URL.
fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
  let mut options = PgConnectOptions::new()
    .host(&config.host)
    .port(config.port)
    .database(&config.name);
  if !config.user.is_empty() {
    options = options.username(&config.user);
  }
  if !config.password.is_empty() {
    options = options.password(&config.password);
  }
  options
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for PgVersionStore {
  type Error = Error;

  async fn stored_version(&self) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar(SELECT_VALUE)
      .bind(VERSION_KEY)
      .fetch_optional(&self.pool)
      .await?;
    Ok(value)
  }

  async fn set_stored_version<'a>(&'a self, version: Option<&'a str>) -> Result<()> {
    let value = stored_value(version);
    sqlx::query(UPSERT_VALUE)
      .bind(VERSION_KEY)
      .bind(&value)
      .execute(&self.pool)
      .await?;
    tracing::info!(version = %value, "stored app version");
    Ok(())
  }
}
