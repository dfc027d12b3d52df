//! The `VersionStore` trait: the last-applied application version, persisted
//! in the primary database.
//!
//! The store holds a single logical row keyed by [`VERSION_KEY`]. Absence of
//! the row means no version has been recorded yet, which version comparison
//! treats as oldest.

use std::{convert::Infallible, future::Future, sync::Mutex};

/// Key of the application-version row.
pub const VERSION_KEY: &str = "app_version";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the version record backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait VersionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the raw stored value. `Ok(None)` if the row is absent.
  fn stored_version(
    &self,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Upsert the version row. `None` stores the empty string. Calling twice
  /// with the same value leaves a single row.
  fn set_stored_version<'a>(
    &'a self,
    version: Option<&'a str>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Read the stored version, never failing.
///
/// Any backend error (unreachable database, table not yet migrated) and a
/// blank value both read as `None`.
pub async fn get_stored_version<S: VersionStore>(store: &S) -> Option<String> {
  store
    .stored_version()
    .await
    .ok()
    .flatten()
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

/// Normalise the value written by [`VersionStore::set_stored_version`].
pub fn stored_value(version: Option<&str>) -> String {
  version.map(str::trim).unwrap_or_default().to_owned()
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// A process-local [`VersionStore`], for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
  value: Mutex<Option<String>>,
}

impl MemoryVersionStore {
  pub fn new(initial: Option<&str>) -> Self {
    Self { value: Mutex::new(initial.map(str::to_owned)) }
  }

  /// Replace the stored value directly, bypassing normalisation.
  pub fn replace(&self, value: Option<&str>) {
    *self.lock() = value.map(str::to_owned);
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
    // The guarded value is a plain string; a poisoned lock still holds a
    // usable value.
    self.value.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl VersionStore for MemoryVersionStore {
  type Error = Infallible;

  async fn stored_version(&self) -> Result<Option<String>, Infallible> {
    Ok(self.lock().clone())
  }

  async fn set_stored_version<'a>(
    &'a self,
    version: Option<&'a str>,
  ) -> Result<(), Infallible> {
    *self.lock() = Some(stored_value(version));
    Ok(())
  }
}
