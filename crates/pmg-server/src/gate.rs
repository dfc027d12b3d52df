//! Downgrade guard in front of every route.
//!
//! The first request in the process compares the running version with the
//! stored one; the verdict is cached until restart. When the database was
//! last used by newer code every request gets a 503 page and no handler
//! runs.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::{StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use pmg_core::{
  compat::{self, Compatibility},
  probe::VersionProbe,
  store::VersionStore,
};
use tokio::sync::OnceCell;

/// Process-scoped compatibility verdict.
pub struct CompatibilityGate<S> {
  store:   Arc<S>,
  probe:   Arc<dyn VersionProbe>,
  verdict: OnceCell<Compatibility>,
}

impl<S: VersionStore> CompatibilityGate<S> {
  pub fn new(store: Arc<S>, probe: Arc<dyn VersionProbe>) -> Self {
    Self { store, probe, verdict: OnceCell::new() }
  }

  /// The cached verdict, computing it on first call.
  ///
  /// Concurrent first callers wait on a single check. Store failures are
  /// treated as compatible.
  pub async fn ensure_checked(&self) -> &Compatibility {
    self.verdict.get_or_init(|| self.run_check()).await
  }

  async fn run_check(&self) -> Compatibility {
    let current = self.probe.current_version();
    let stored = match self.store.stored_version().await {
      Ok(stored) => stored
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty()),
      Err(e) => {
        tracing::warn!(error = %e, "version check failed; allowing traffic");
        return Compatibility::assumed_ok();
      }
    };

    let verdict = compat::check(current, stored);
    if verdict.ok {
      tracing::info!(
        current = verdict.current.as_deref().unwrap_or(""),
        stored = verdict.stored.as_deref().unwrap_or(""),
        "version check passed"
      );
    } else {
      tracing::error!(
        message = verdict.message.as_deref().unwrap_or(""),
        "version downgrade detected; refusing all requests"
      );
    }
    verdict
  }
}

/// axum middleware: pass the request on, or answer 503 if the gate is
/// closed.
pub async fn version_gate<S: VersionStore>(
  State(gate): State<Arc<CompatibilityGate<S>>>,
  req: Request,
  next: Next,
) -> Response {
  let verdict = gate.ensure_checked().await;
  if verdict.ok {
    return next.run(req).await;
  }
  blocked_response(verdict.message.as_deref())
}

fn blocked_response(message: Option<&str>) -> Response {
  let message = message
    .unwrap_or("The database was used with a newer application version.");
  let body = format!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Version mismatch</title></head><body>\
     <h1>Version downgrade detected</h1><p>{}</p>\
     <p>Run migrations backwards to match the current code version, then restart the service.</p>\
     </body></html>",
    escape_html(message)
  );
  (
    StatusCode::SERVICE_UNAVAILABLE,
    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
    body,
  )
    .into_response()
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      c => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use pmg_core::store::MemoryVersionStore;

  use super::*;

  struct Fixed(Option<&'static str>);

  impl VersionProbe for Fixed {
    fn current_version(&self) -> Option<String> { self.0.map(str::to_owned) }
  }

  #[derive(Debug, thiserror::Error)]
  #[error("connection refused")]
  struct Unreachable;

  struct DownStore;

  impl VersionStore for DownStore {
    type Error = Unreachable;

    async fn stored_version(&self) -> Result<Option<String>, Unreachable> { Err(Unreachable) }

    async fn set_stored_version<'a>(&'a self, _: Option<&'a str>) -> Result<(), Unreachable> {
      Err(Unreachable)
    }
  }

  fn gate(current: Option<&'static str>, stored: Option<&str>) -> CompatibilityGate<MemoryVersionStore> {
    CompatibilityGate::new(Arc::new(MemoryVersionStore::new(stored)), Arc::new(Fixed(current)))
  }

  #[tokio::test]
  async fn downgrade_blocks_with_both_versions() {
    let gate = gate(Some("4.9.0"), Some("5.0.0"));
    let verdict = gate.ensure_checked().await;
    assert!(!verdict.ok);
    let msg = verdict.message.as_deref().unwrap();
    assert!(msg.contains("4.9.0") && msg.contains("5.0.0"), "{msg}");
  }

  #[tokio::test]
  async fn fresh_install_is_allowed() {
    assert!(gate(Some("1.0.0"), None).ensure_checked().await.ok);
  }

  #[tokio::test]
  async fn verdict_is_cached_for_the_process() {
    let store = Arc::new(MemoryVersionStore::new(Some("5.0.0")));
    let gate = CompatibilityGate::new(store.clone(), Arc::new(Fixed(Some("5.0.0"))));
    assert!(gate.ensure_checked().await.ok);

    store.replace(Some("9.0.0"));
    assert!(gate.ensure_checked().await.ok);
  }

  #[tokio::test]
  async fn blocked_verdict_is_cached_too() {
    let store = Arc::new(MemoryVersionStore::new(Some("5.0.0")));
    let gate = CompatibilityGate::new(store.clone(), Arc::new(Fixed(Some("4.0.0"))));
    assert!(!gate.ensure_checked().await.ok);

    store.replace(None);
    assert!(!gate.ensure_checked().await.ok);
  }

  #[tokio::test]
  async fn store_failure_fails_open() {
    let gate = CompatibilityGate::new(Arc::new(DownStore), Arc::new(Fixed(Some("1.0.0"))));
    let verdict = gate.ensure_checked().await;
    assert!(verdict.ok);
    assert!(verdict.message.is_none());
  }

  #[test]
  fn page_escapes_message() {
    let res = blocked_response(Some("<script>"));
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
  }
}
