//! Restore: replace the live database and media tree from an archive.
//!
//! # Not transactional
//!
//! The steps run strictly in order (database restore, schema migrations,
//! version stamp, media replacement) with no rollback. A failure after the
//! database restore leaves a mixed state, e.g. the restored database with
//! the old media tree. Two restores running at once are not prevented
//! either; callers must make sure only one operator restores at a time.

use std::{fs, path::Path};

use flate2::read::GzDecoder;
use pmg_core::{
  manifest::{DATABASE_FILENAME, MANIFEST_FILENAME, MEDIA_DIR, Manifest},
  store::VersionStore,
};
use tempfile::TempDir;

use crate::{Backups, Error, Result, media::replace_tree, tool::DatabaseTool};

impl<T: DatabaseTool, S: VersionStore> Backups<T, S> {
  /// Restore from an archive that has already passed
  /// [`validate_backup_archive`](crate::validate_backup_archive).
  ///
  /// The manifest's format version and engine are checked again before
  /// anything is touched. Returns the archive's manifest.
  pub async fn restore_from_archive(&self, archive: &Path) -> Result<Manifest> {
    let workdir = tempfile::Builder::new().prefix("pmg_restore_").tempdir()?;
    let archive = archive.to_path_buf();

    // Extraction owns the work directory while it runs, so the directory is
    // removed only after the blocking task has stopped writing to it.
    let (workdir, manifest) = tokio::task::spawn_blocking(move || {
      let manifest = unpack(&archive, workdir.path())?;
      Ok::<_, Error>((workdir, manifest))
    })
    .await??;

    let dump = workdir.path().join(DATABASE_FILENAME);
    if !dump.is_file() {
      return Err(Error::MissingEntry(DATABASE_FILENAME));
    }

    tracing::warn!(
      format_version = %manifest.version,
      app_version = %manifest.app_version,
      created_at = %manifest.created_at,
      "restoring backup; the live database and media will be replaced"
    );

    self.tool.restore(&dump).await?;
    self.migrations.run().await?;

    let current = self.probe.current_version();
    self
      .store
      .set_stored_version(current.as_deref())
      .await
      .map_err(|e| Error::VersionStore(Box::new(e)))?;
    tracing::info!(version = current.as_deref().unwrap_or(""), "re-stamped app version");

    let media_root = self.media_root.clone();
    let files = tokio::task::spawn_blocking(move || replace_media(workdir, &media_root)).await??;

    tracing::info!(media_files = files, "restore complete");
    Ok(manifest)
  }
}

/// Extract `archive` into `dest` and return its checked manifest.
fn unpack(archive: &Path, dest: &Path) -> Result<Manifest> {
  let file = fs::File::open(archive)?;
  let mut tar = tar::Archive::new(GzDecoder::new(std::io::BufReader::new(file)));
  tar.unpack(dest)?;

  let manifest_path = dest.join(MANIFEST_FILENAME);
  if !manifest_path.is_file() {
    return Err(Error::MissingEntry(MANIFEST_FILENAME));
  }
  let manifest = Manifest::from_slice(&fs::read(&manifest_path)?)?;
  manifest.check_restorable()?;
  Ok(manifest)
}

/// Swap the archived media into place; consumes (and so removes) the work
/// directory.
fn replace_media(workdir: TempDir, media_root: &Path) -> Result<u64> {
  let src = workdir.path().join(MEDIA_DIR);
  if !src.is_dir() {
    tracing::warn!("backup has no media directory; leaving media root untouched");
    return Ok(0);
  }
  Ok(replace_tree(&src, media_root)?)
}
