//! Error type for `pmg-backup`.
//!
//! Archive validation has its own type, [`crate::validate::InvalidArchive`],
//! because validation never fails with an error: it always produces a
//! verdict.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Configuration and manifest errors from `pmg-core`.
  #[error(transparent)]
  Core(#[from] pmg_core::Error),

  #[error("{program} not found. {hint}")]
  ToolMissing { program: String, hint: String },

  #[error("{operation} failed: {output}")]
  ToolFailed {
    operation: &'static str,
    output:    String,
  },

  #[error("{operation} timed out after {}s", .timeout.as_secs())]
  ToolTimeout {
    operation: &'static str,
    timeout:   Duration,
  },

  #[error("invalid backup: missing {0}")]
  MissingEntry(&'static str),

  #[error("could not record app version: {0}")]
  VersionStore(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
