//! Commands that run against the local database and media root.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use pmg_backup::{
  Backups,
  archive::{archive_digest, backup_filename},
  config::BackupConfig,
  tool::{MigrationRunner, PgTools},
  validate_backup_archive,
};
use pmg_core::{
  compat,
  config::DatabaseConfig,
  probe::{FileVersionProbe, VersionProbe},
  store::{VersionStore, get_stored_version},
};
use pmg_store_pg::PgVersionStore;
use serde::Deserialize;

/// The subset of the server configuration the local commands need.
#[derive(Deserialize, Debug)]
pub struct CliConfig {
  pub base_dir:      PathBuf,
  #[serde(default)]
  pub version_files: Vec<PathBuf>,
  pub database:      DatabaseConfig,
  pub backup:        Option<BackupConfig>,
}

impl CliConfig {
  fn probe(&self) -> FileVersionProbe {
    if self.version_files.is_empty() {
      FileVersionProbe::new(FileVersionProbe::default_candidates(&self.base_dir))
    } else {
      FileVersionProbe::new(self.version_files.clone())
    }
  }

  fn backup(&self) -> Result<&BackupConfig> {
    self
      .backup
      .as_ref()
      .ok_or_else(|| anyhow!("the [backup] section is missing from the configuration"))
  }
}

pub fn load_config(path: &Path) -> Result<CliConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("PMG")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise configuration")
}

pub fn display_version(v: &str) -> &str { if v.is_empty() { "unknown" } else { v } }

pub fn default_output() -> PathBuf { PathBuf::from(backup_filename(Utc::now())) }

// ─── Version commands ────────────────────────────────────────────────────────

pub async fn check(cfg: &CliConfig) -> Result<()> {
  let store = PgVersionStore::open_lazy(&cfg.database)?;
  let current = cfg.probe().current_version();
  let stored = get_stored_version(&store).await;
  let verdict = compat::check(current, stored);

  println!("current: {}", display_version(verdict.current.as_deref().unwrap_or("")));
  println!("stored:  {}", display_version(verdict.stored.as_deref().unwrap_or("")));
  match verdict.message {
    None => Ok(()),
    Some(message) => Err(anyhow!(message)),
  }
}

/// Store the on-disk version, or the empty string when none is found.
pub async fn stamp_version(cfg: &CliConfig) -> Result<()> {
  let store = PgVersionStore::open_lazy(&cfg.database)?;

  let current = cfg.probe().current_version();
  if current.is_none() {
    tracing::warn!("no VERSION file found; storing an empty version");
  }
  store
    .set_stored_version(current.as_deref())
    .await
    .context("failed to store app version")?;
  println!("stored version: {}", display_version(current.as_deref().unwrap_or("")));
  Ok(())
}

// ─── Backup commands ─────────────────────────────────────────────────────────

pub fn validate(archive: &Path) -> Result<()> {
  let manifest = validate_backup_archive(archive).map_err(|e| anyhow!(e))?;
  println!("{}", manifest.to_json_pretty()?);
  Ok(())
}

async fn backups(cfg: &CliConfig) -> Result<Backups<PgTools, PgVersionStore>> {
  let backup = cfg.backup()?;
  let store = PgVersionStore::open_lazy(&cfg.database)?;
  let tool = PgTools::new(cfg.database.clone(), &backup.tools)?;
  let probe: Arc<dyn VersionProbe> = Arc::new(cfg.probe());
  Ok(Backups::new(
    tool,
    Arc::new(store),
    probe,
    MigrationRunner::from_config(&backup.tools),
    backup.media_root.clone(),
  ))
}

pub async fn backup(cfg: &CliConfig, output: Option<PathBuf>) -> Result<()> {
  let backups = backups(cfg).await?;
  let bytes = backups.create_backup_archive().await?;
  let path = output.unwrap_or_else(default_output);

  tokio::fs::write(&path, &bytes)
    .await
    .with_context(|| format!("writing {}", path.display()))?;
  println!("{}", path.display());
  println!("sha256 {}", archive_digest(&bytes));
  Ok(())
}

pub async fn restore(cfg: &CliConfig, archive: &Path) -> Result<()> {
  validate_backup_archive(archive).map_err(|e| anyhow!(e))?;

  let backups = backups(cfg).await?;
  let manifest = backups.restore_from_archive(archive).await?;
  println!(
    "restored (format {}, app version {})",
    manifest.version,
    display_version(&manifest.app_version)
  );
  Ok(())
}
