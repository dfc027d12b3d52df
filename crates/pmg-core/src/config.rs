//! Primary database connection settings, shared by the version store and the
//! backup tools.

use serde::Deserialize;

use crate::{Error, Result, manifest::DB_ENGINE};

/// Engine identifiers accepted as PostgreSQL.
const POSTGRES_ENGINE_TAGS: &[&str] = &[DB_ENGINE, "postgres", "django.db.backends.postgresql"];

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
  #[serde(default = "default_engine")]
  pub engine:   String,
  #[serde(default = "default_host")]
  pub host:     String,
  #[serde(default = "default_port")]
  pub port:     u16,
  #[serde(default)]
  pub user:     String,
  #[serde(default)]
  pub password: String,
  pub name:     String,
}

impl DatabaseConfig {
  /// Fail unless the configured engine is PostgreSQL.
  pub fn check_engine(&self) -> Result<()> {
    if POSTGRES_ENGINE_TAGS.contains(&self.engine.as_str()) {
      Ok(())
    } else {
      Err(Error::UnsupportedEngine(self.engine.clone()))
    }
  }
}

// The password is deliberately left out.
impl std::fmt::Debug for DatabaseConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DatabaseConfig")
      .field("engine", &self.engine)
      .field("host", &self.host)
      .field("port", &self.port)
      .field("user", &self.user)
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

fn default_engine() -> String { DB_ENGINE.to_owned() }
fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 5432 }
