//! Full backup and restore for PMG Portal: the PostgreSQL database plus the
//! media tree, packed into one `.tar.gz`.
//!
//! ```text
//! manifest.json   format version, app version, timestamp, engine
//! database.sql    self-contained dump (drops and recreates on replay)
//! media/          copy of the media root
//! ```
//!
//! [`Backups`] ties together the database tool, the version store, the
//! version probe and the media root. Archive creation lives in [`archive`],
//! restore in [`restore`], and upload checking in [`validate`].

pub mod archive;
pub mod config;
pub mod error;
pub mod media;
pub mod restore;
pub mod tool;
pub mod validate;

pub use error::{Error, Result};
pub use validate::{InvalidArchive, validate_backup_archive};

use std::{path::PathBuf, sync::Arc};

use pmg_core::probe::VersionProbe;

use tool::{DatabaseTool, MigrationRunner};

/// Backup and restore for one portal deployment.
pub struct Backups<T, S> {
  tool:       T,
  store:      Arc<S>,
  probe:      Arc<dyn VersionProbe>,
  migrations: MigrationRunner,
  media_root: PathBuf,
}

impl<T: DatabaseTool, S> Backups<T, S> {
  pub fn new(
    tool: T,
    store: Arc<S>,
    probe: Arc<dyn VersionProbe>,
    migrations: MigrationRunner,
    media_root: impl Into<PathBuf>,
  ) -> Self {
    Self { tool, store, probe, migrations, media_root: media_root.into() }
  }

  pub fn tool(&self) -> &T { &self.tool }

  pub fn media_root(&self) -> &std::path::Path { &self.media_root }
}
