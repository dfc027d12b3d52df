//! `POST /admin/restore`: validate an uploaded archive, then restore it.
//!
//! The raw request body is the archive. It is streamed chunk by chunk into a
//! temporary file that is deleted on every outcome; a failed attempt needs a
//! fresh upload.

use axum::{Json, body::Body, extract::State};
use http_body_util::BodyExt as _;
use pmg_backup::{tool::DatabaseTool, validate_backup_archive};
use pmg_core::store::VersionStore;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt as _;

use crate::{AppState, auth::Operator, error::Error};

#[derive(Debug, Serialize)]
pub struct Restored {
  pub status:         &'static str,
  pub format_version: String,
  pub app_version:    String,
}

pub async fn handler<T, S>(
  _operator: Operator,
  State(state): State<AppState<T, S>>,
  body: Body,
) -> Result<Json<Restored>, Error>
where
  T: DatabaseTool + 'static,
  S: VersionStore + 'static,
{
  let upload = tempfile::Builder::new()
    .prefix("pmg_upload_")
    .suffix(".tar.gz")
    .tempfile()?;
  let size = spool(body, &upload, state.max_upload_bytes).await?;
  tracing::info!(bytes = size, "restore upload received");

  let (upload, verdict) = tokio::task::spawn_blocking(move || {
    let verdict = validate_backup_archive(upload.path());
    (upload, verdict)
  })
  .await?;
  if let Err(e) = verdict {
    tracing::warn!(reason = %e, "rejected restore upload");
    return Err(e.into());
  }

  // Detached so a client disconnect cannot stop a restore half-way.
  let backups = state.backups.clone();
  let manifest = tokio::spawn(async move {
    let restored = backups.restore_from_archive(upload.path()).await;
    drop(upload);
    restored
  })
  .await??;

  Ok(Json(Restored {
    status:         "restored",
    format_version: manifest.version,
    app_version:    manifest.app_version,
  }))
}

/// Copy the request body into `upload`, never holding more than one chunk in
/// memory. Fails once more than `limit` bytes have arrived.
async fn spool(mut body: Body, upload: &NamedTempFile, limit: usize) -> Result<u64, Error> {
  let mut file = tokio::fs::File::from_std(upload.reopen()?);
  let mut written: u64 = 0;

  while let Some(frame) = body.frame().await {
    let Ok(chunk) = frame.map_err(Error::Upload)?.into_data() else {
      continue;
    };
    written += chunk.len() as u64;
    if written > limit as u64 {
      tracing::warn!(limit, "restore upload exceeds the size limit");
      return Err(Error::UploadTooLarge { limit });
    }
    file.write_all(&chunk).await?;
  }

  file.flush().await?;
  Ok(written)
}
