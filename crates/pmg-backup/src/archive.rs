//! Archive creation.

use std::{
  fs::{self, File},
  io,
  path::Path,
};

use chrono::{DateTime, Utc};
use flate2::{Compression, write::GzEncoder};
use pmg_core::manifest::{DATABASE_FILENAME, DB_ENGINE, MANIFEST_FILENAME, MEDIA_DIR, Manifest};
use sha2::{Digest, Sha256};

use crate::{Backups, Result, media::copy_tree, tool::DatabaseTool};

/// Name of the intermediate archive inside the staging directory.
const STAGED_ARCHIVE: &str = "backup.tar.gz";

impl<T: DatabaseTool, S> Backups<T, S> {
  /// Snapshot the database and media root into `.tar.gz` bytes.
  ///
  /// Read-only with respect to the live database and media. All staging
  /// files, including the intermediate archive, are removed on every exit
  /// path.
  pub async fn create_backup_archive(&self) -> Result<Vec<u8>> {
    if self.tool.engine() != DB_ENGINE {
      return Err(pmg_core::Error::UnsupportedEngine(self.tool.engine().to_owned()).into());
    }

    let staging = tempfile::Builder::new().prefix("pmg_backup_").tempdir()?;

    let manifest = Manifest::new(self.probe.current_version(), Utc::now());
    tokio::fs::write(staging.path().join(MANIFEST_FILENAME), manifest.to_json_pretty()?)
      .await?;

    self.tool.dump(&staging.path().join(DATABASE_FILENAME)).await?;

    let media_root = self.media_root.clone();
    // The staging directory moves into the blocking task so it is removed
    // only once packaging has finished, even if this future is dropped.
    let bytes = tokio::task::spawn_blocking(move || {
      let packed = package(staging.path(), &media_root);
      drop(staging);
      packed
    })
    .await??;

    tracing::info!(
      bytes = bytes.len(),
      sha256 = %archive_digest(&bytes),
      app_version = %manifest.app_version,
      "backup archive created"
    );
    Ok(bytes)
  }
}

/// Stage the media tree next to the manifest and dump, then pack all three
/// under their logical names.
fn package(root: &Path, media_root: &Path) -> io::Result<Vec<u8>> {
  let media_stage = root.join(MEDIA_DIR);
  if media_root.is_dir() {
    let files = copy_tree(media_root, &media_stage)?;
    tracing::debug!(files, media_root = %media_root.display(), "staged media");
  } else {
    tracing::warn!(media_root = %media_root.display(), "media root missing; archiving empty media directory");
    fs::create_dir_all(&media_stage)?;
  }

  let archive_path = root.join(STAGED_ARCHIVE);
  let file = File::create(&archive_path)?;
  let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
  tar.append_path_with_name(root.join(MANIFEST_FILENAME), MANIFEST_FILENAME)?;
  tar.append_path_with_name(root.join(DATABASE_FILENAME), DATABASE_FILENAME)?;
  tar.append_dir_all(MEDIA_DIR, &media_stage)?;
  tar.into_inner()?.finish()?;

  fs::read(&archive_path)
}

/// Download filename for an archive created at `now`.
pub fn backup_filename(now: DateTime<Utc>) -> String {
  format!("pmg-portal-backup-{}.tar.gz", now.format("%Y%m%d-%H%M%S"))
}

/// Hex SHA-256 of archive bytes.
pub fn archive_digest(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }
