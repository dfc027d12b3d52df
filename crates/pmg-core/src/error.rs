//! Error types for `pmg-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("backup and restore only support PostgreSQL (configured engine: {0:?})")]
  UnsupportedEngine(String),

  #[error("manifest is not valid JSON: {0}")]
  ManifestJson(#[from] serde_json::Error),

  #[error("manifest must be a JSON object")]
  ManifestNotObject,

  #[error("manifest has no format version")]
  MissingFormatVersion,

  #[error(
    "unsupported backup format version {found:?}; supported: {}",
    .supported.join(", ")
  )]
  UnsupportedFormatVersion {
    found:     String,
    supported: Vec<String>,
  },

  #[error("this backup is for a different database engine ({found:?}, expected {expected:?})")]
  EngineMismatch { found: String, expected: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
