//! External programs: the database dump/restore pair and the schema
//! migration runner.
//!
//! Every program runs with a piped, captured stdout/stderr, no stdin, and a
//! hard timeout. A child still running when its timeout fires (or when the
//! calling future is dropped) is killed.

use std::{
  future::Future,
  io::ErrorKind,
  path::Path,
  process::{Output, Stdio},
  time::Duration,
};

use pmg_core::{config::DatabaseConfig, manifest::DB_ENGINE};
use tokio::process::Command;

use crate::{Error, Result, config::ToolConfig};

const PG_CLIENT_HINT: &str =
  "Install the PostgreSQL client tools (e.g. postgresql-client) and make sure they are on PATH.";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Dumps and restores the primary database.
///
/// Implementations own the concrete programs and flags for one engine, so
/// the archive and restore logic never see them.
pub trait DatabaseTool: Send + Sync {
  /// Engine tag written to, and expected in, backup manifests.
  fn engine(&self) -> &str;

  /// Write a self-contained script to `target` that drops and recreates
  /// every object when replayed.
  fn dump<'a>(&'a self, target: &'a Path) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Replay a script produced by [`DatabaseTool::dump`], stopping at the
  /// first error.
  fn restore<'a>(&'a self, source: &'a Path) -> impl Future<Output = Result<()>> + Send + 'a;
}

// ─── PostgreSQL ──────────────────────────────────────────────────────────────

/// `pg_dump` / `psql` against the configured PostgreSQL database.
///
/// The password travels in `PGPASSWORD`, never on the command line.
#[derive(Debug, Clone)]
pub struct PgTools {
  db:              DatabaseConfig,
  dump_program:    String,
  restore_program: String,
  timeout:         Duration,
}

impl PgTools {
  /// Fails with a configuration error unless `db` is PostgreSQL.
  pub fn new(db: DatabaseConfig, tools: &ToolConfig) -> Result<Self> {
    db.check_engine()?;
    Ok(Self {
      db,
      dump_program: tools.dump_program.clone(),
      restore_program: tools.restore_program.clone(),
      timeout: tools.timeout(),
    })
  }

  fn command(&self, program: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd
      .arg("--no-password")
      .arg("-h")
      .arg(&self.db.host)
      .arg("-p")
      .arg(self.db.port.to_string())
      .arg("-U")
      .arg(&self.db.user)
      .arg("-d")
      .arg(&self.db.name)
      .env("PGPASSWORD", &self.db.password);
    cmd
  }
}

impl DatabaseTool for PgTools {
  fn engine(&self) -> &str { DB_ENGINE }

  async fn dump<'a>(&'a self, target: &'a Path) -> Result<()> {
    let mut cmd = self.command(&self.dump_program);
    cmd.arg("--clean").arg("--if-exists").arg("-f").arg(target);

    tracing::info!(program = %self.dump_program, db = %self.db.name, "dumping database");
    let output = run(cmd, &self.dump_program, PG_CLIENT_HINT, "Database dump", self.timeout)
      .await?;
    check_status("Database dump", &output)
  }

  async fn restore<'a>(&'a self, source: &'a Path) -> Result<()> {
    let mut cmd = self.command(&self.restore_program);
    cmd.arg("-f").arg(source).arg("-v").arg("ON_ERROR_STOP=1");

    tracing::info!(program = %self.restore_program, db = %self.db.name, "restoring database");
    let output = run(
      cmd,
      &self.restore_program,
      PG_CLIENT_HINT,
      "Database restore",
      self.timeout,
    )
    .await?;
    check_status("Database restore", &output)
  }
}

// ─── Migrations ──────────────────────────────────────────────────────────────

/// Runs the portal's schema migrations after a restore, bringing a backup
/// taken on older code up to the schema the running code expects.
#[derive(Debug, Clone, Default)]
pub struct MigrationRunner {
  command: Vec<String>,
  timeout: Duration,
}

impl MigrationRunner {
  pub fn new(command: Vec<String>, timeout: Duration) -> Self {
    Self { command, timeout }
  }

  pub fn from_config(tools: &ToolConfig) -> Self {
    Self::new(tools.migrate_command.clone(), tools.timeout())
  }

  /// A runner that does nothing.
  pub fn disabled() -> Self { Self::default() }

  pub async fn run(&self) -> Result<()> {
    let Some((program, args)) = self.command.split_first() else {
      tracing::warn!("no migration command configured; skipping schema migrations");
      return Ok(());
    };

    let mut cmd = Command::new(program);
    cmd.args(args);

    tracing::info!(%program, "running schema migrations");
    let output = run(
      cmd,
      program,
      "Check the configured migration command.",
      "Schema migration",
      self.timeout,
    )
    .await?;
    check_status("Schema migration", &output)
  }
}

// ─── Process helpers ─────────────────────────────────────────────────────────

/// Spawn `cmd` and collect its output, bounded by `timeout`.
pub(crate) async fn run(
  mut cmd: Command,
  program: &str,
  hint: &str,
  operation: &'static str,
  timeout: Duration,
) -> Result<Output> {
  cmd
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let child = match cmd.spawn() {
    Ok(child) => child,
    Err(e) if e.kind() == ErrorKind::NotFound => {
      return Err(Error::ToolMissing {
        program: program.to_owned(),
        hint:    hint.to_owned(),
      });
    }
    Err(e) => return Err(e.into()),
  };

  // On timeout the `wait_with_output` future, and with it the child, is
  // dropped; `kill_on_drop` reaps the process.
  match tokio::time::timeout(timeout, child.wait_with_output()).await {
    Ok(output) => Ok(output?),
    Err(_) => {
      tracing::error!(%program, timeout_secs = timeout.as_secs(), "{operation} timed out");
      Err(Error::ToolTimeout { operation, timeout })
    }
  }
}

/// Map a non-zero exit into [`Error::ToolFailed`], carrying stderr (or
/// stdout when stderr is empty).
pub(crate) fn check_status(operation: &'static str, output: &Output) -> Result<()> {
  if output.status.success() {
    return Ok(());
  }

  let stderr = String::from_utf8_lossy(&output.stderr);
  let stdout = String::from_utf8_lossy(&output.stdout);
  tracing::error!(status = %output.status, %stderr, %stdout, "{operation} failed");

  let captured = if !stderr.trim().is_empty() {
    stderr.trim().to_owned()
  } else if !stdout.trim().is_empty() {
    stdout.trim().to_owned()
  } else {
    output.status.to_string()
  };
  Err(Error::ToolFailed { operation, output: captured })
}
