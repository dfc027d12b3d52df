//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use pmg_backup::InvalidArchive;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  /// Shown to the operator verbatim.
  #[error(transparent)]
  InvalidArchive(#[from] InvalidArchive),
  #[error("could not read the upload: {0}")]
  Upload(#[source] axum::Error),
  #[error("Upload is larger than the {limit}-byte limit.")]
  UploadTooLarge { limit: usize },
  #[error(transparent)]
  Backup(#[from] pmg_backup::Error),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl Error {
  fn status(&self) -> StatusCode {
    match self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::InvalidArchive(_) | Error::Upload(_) => StatusCode::BAD_REQUEST,
      Error::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
      Error::Backup(_) | Error::Io(_) | Error::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, Error::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"pmg-portal\""),
      );
    }
    res
  }
}
