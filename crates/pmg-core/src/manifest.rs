//! The backup manifest: the self-describing header stored in every archive.
//!
//! The archive layout is fixed: `manifest.json`, `database.sql` and a
//! `media/` directory at the top level. `version` in the manifest names the
//! archive layout, not the application; the application version that
//! produced the archive is carried separately in `app_version`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

// ─── Archive layout ──────────────────────────────────────────────────────────

/// Format version written by this build.
pub const BACKUP_FORMAT_VERSION: &str = "1";

/// Format versions this build can restore. Append-only.
pub const SUPPORTED_FORMAT_VERSIONS: &[&str] = &["1"];

/// The single supported database engine tag.
pub const DB_ENGINE: &str = "postgresql";

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const DATABASE_FILENAME: &str = "database.sql";
pub const MEDIA_DIR: &str = "media";

// ─── Manifest ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
  /// Archive format version; must be in [`SUPPORTED_FORMAT_VERSIONS`].
  pub version:     String,
  /// Application version that produced the archive; may be empty.
  pub app_version: String,
  /// ISO-8601 UTC creation timestamp.
  pub created_at:  String,
  pub db_engine:   String,
}

impl Manifest {
  /// A manifest for an archive produced by this build.
  pub fn new(app_version: Option<String>, created_at: DateTime<Utc>) -> Self {
    Self {
      version:     BACKUP_FORMAT_VERSION.to_owned(),
      app_version: app_version.unwrap_or_default(),
      created_at:  created_at.to_rfc3339_opts(SecondsFormat::Micros, false),
      db_engine:   DB_ENGINE.to_owned(),
    }
  }

  /// Parse manifest bytes.
  ///
  /// Older archives wrote `version` as a JSON number; any scalar is
  /// normalised to its string form here so nothing downstream has to care.
  pub fn from_slice(bytes: &[u8]) -> Result<Self> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Object(map) = value else {
      return Err(Error::ManifestNotObject);
    };

    let version = match map.get("version") {
      None | Some(Value::Null) => return Err(Error::MissingFormatVersion),
      Some(v) => scalar_to_string(v).unwrap_or_else(|| v.to_string()),
    };

    let field = |name: &str| {
      map
        .get(name)
        .and_then(scalar_to_string)
        .unwrap_or_default()
    };

    Ok(Self {
      version,
      app_version: field("app_version"),
      created_at: field("created_at"),
      db_engine: field("db_engine"),
    })
  }

  pub fn to_json_pretty(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Reject archives this build must not restore: unknown format versions
  /// and foreign database engines.
  pub fn check_restorable(&self) -> Result<()> {
    if !SUPPORTED_FORMAT_VERSIONS.contains(&self.version.as_str()) {
      return Err(Error::UnsupportedFormatVersion {
        found:     self.version.clone(),
        supported: SUPPORTED_FORMAT_VERSIONS
          .iter()
          .map(|v| (*v).to_owned())
          .collect(),
      });
    }
    if self.db_engine != DB_ENGINE {
      return Err(Error::EngineMismatch {
        found:    self.db_engine.clone(),
        expected: DB_ENGINE.to_owned(),
      });
    }
    Ok(())
  }
}

fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}
