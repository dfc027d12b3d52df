//! HTTP surface for PMG Portal backups.
//!
//! Exposes an axum [`Router`] with the operator backup/restore endpoints,
//! every route sitting behind the downgrade [`gate`].

pub mod auth;
pub mod error;
pub mod gate;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  middleware,
  routing::{get, post},
};
use pmg_backup::{Backups, config::BackupConfig, tool::DatabaseTool};
use pmg_core::{
  config::DatabaseConfig,
  probe::{FileVersionProbe, VersionProbe},
  store::VersionStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use gate::CompatibilityGate;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `PMG_*`
/// environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub auth_username:      String,
  pub auth_password_hash: String,
  /// Application directory; `VERSION` is looked up in its parent, in it,
  /// then at the install location.
  pub base_dir:           PathBuf,
  /// Explicit `VERSION` candidates, replacing the search order above.
  #[serde(default)]
  pub version_files:      Vec<PathBuf>,
  /// Largest accepted restore upload.
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes:   usize,
  pub database:           DatabaseConfig,
  pub backup:             BackupConfig,
}

impl ServerConfig {
  pub fn version_probe(&self) -> FileVersionProbe {
    if self.version_files.is_empty() {
      FileVersionProbe::new(FileVersionProbe::default_candidates(&self.base_dir))
    } else {
      FileVersionProbe::new(self.version_files.clone())
    }
  }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_upload_bytes() -> usize { 1024 * 1024 * 1024 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<T, S> {
  pub backups:          Arc<Backups<T, S>>,
  pub store:            Arc<S>,
  pub probe:            Arc<dyn VersionProbe>,
  pub gate:             Arc<CompatibilityGate<S>>,
  pub auth:             Arc<AuthConfig>,
  pub max_upload_bytes: usize,
}

// Manual impl: `T` and `S` themselves need not be `Clone`.
impl<T, S> Clone for AppState<T, S> {
  fn clone(&self) -> Self {
    Self {
      backups:          self.backups.clone(),
      store:            self.store.clone(),
      probe:            self.probe.clone(),
      gate:             self.gate.clone(),
      auth:             self.auth.clone(),
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`]. The version gate wraps every route, including
/// the 404 fallback.
pub fn router<T, S>(state: AppState<T, S>) -> Router
where
  T: DatabaseTool + 'static,
  S: VersionStore + 'static,
{
  let gate = state.gate.clone();
  Router::new()
    .route("/healthz", get(handlers::healthz))
    .route("/admin/backup", get(handlers::backup::handler::<T, S>))
    .route("/admin/restore", post(handlers::restore::handler::<T, S>))
    .route("/admin/version", get(handlers::version::handler::<T, S>))
    .layer(middleware::from_fn_with_state(gate, gate::version_gate::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
