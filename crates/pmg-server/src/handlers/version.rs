//! `GET /admin/version`: uncached version diagnostics.

use axum::{Json, extract::State};
use pmg_core::{compat, store::{VersionStore, get_stored_version}};
use serde::Serialize;

use crate::{AppState, auth::Operator};

#[derive(Debug, Serialize)]
pub struct VersionReport {
  pub current:    Option<String>,
  pub stored:     Option<String>,
  pub compatible: bool,
  pub message:    Option<String>,
}

pub async fn handler<T, S>(
  _operator: Operator,
  State(state): State<AppState<T, S>>,
) -> Json<VersionReport>
where
  T: Send + Sync + 'static,
  S: VersionStore + 'static,
{
  let current = state.probe.current_version();
  let stored = get_stored_version(state.store.as_ref()).await;
  let verdict = compat::check(current, stored);

  Json(VersionReport {
    current:    verdict.current,
    stored:     verdict.stored,
    compatible: verdict.ok,
    message:    verdict.message,
  })
}
