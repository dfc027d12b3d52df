//! Backup settings, deserialised from the `[backup]` table of `config.toml`.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct BackupConfig {
  /// Directory of uploaded media files, captured and replaced wholesale.
  pub media_root: PathBuf,
  #[serde(default)]
  pub tools:      ToolConfig,
}

/// External programs used by backup and restore.
#[derive(Deserialize, Clone, Debug)]
pub struct ToolConfig {
  #[serde(default = "default_dump_program")]
  pub dump_program:    String,
  #[serde(default = "default_restore_program")]
  pub restore_program: String,
  /// Ceiling for each external program run.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:    u64,
  /// Schema migration command run after a database restore, program first,
  /// e.g. `["python", "manage.py", "migrate", "--noinput"]`. It must not
  /// prompt. Empty skips migrations.
  #[serde(default)]
  pub migrate_command: Vec<String>,
}

impl ToolConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl Default for ToolConfig {
  fn default() -> Self {
    Self {
      dump_program:    default_dump_program(),
      restore_program: default_restore_program(),
      timeout_secs:    default_timeout_secs(),
      migrate_command: Vec::new(),
    }
  }
}

fn default_dump_program() -> String { "pg_dump".to_owned() }
fn default_restore_program() -> String { "psql".to_owned() }
fn default_timeout_secs() -> u64 { 600 }
