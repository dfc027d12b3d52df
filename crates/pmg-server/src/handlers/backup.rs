//! `GET /admin/backup`: stream a fresh archive to the operator.

use axum::{
  body::Body,
  extract::State,
  http::{HeaderName, StatusCode, header},
  response::Response,
};
use chrono::Utc;
use pmg_backup::{
  archive::{archive_digest, backup_filename},
  tool::DatabaseTool,
};
use pmg_core::store::VersionStore;

use crate::{AppState, auth::Operator, error::Error};

pub const DIGEST_HEADER: &str = "x-backup-sha256";

pub async fn handler<T, S>(
  _operator: Operator,
  State(state): State<AppState<T, S>>,
) -> Result<Response, Error>
where
  T: DatabaseTool + 'static,
  S: VersionStore + 'static,
{
  tracing::info!("backup requested");
  let bytes = state.backups.create_backup_archive().await?;
  let filename = backup_filename(Utc::now());

  let response = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, "application/gzip")
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}\""),
    )
    .header(HeaderName::from_static(DIGEST_HEADER), archive_digest(&bytes))
    .header(header::CONTENT_LENGTH, bytes.len())
    .body(Body::from(bytes));

  response.map_err(|e| Error::Io(std::io::Error::other(e)))
}
