//! `pmgctl`: operator tool for PMG Portal versions and backups.
//!
//! # Usage
//!
//! ```
//! pmgctl check
//! pmgctl stamp-version
//! pmgctl backup --output nightly.tar.gz
//! pmgctl validate nightly.tar.gz
//! pmgctl restore nightly.tar.gz --yes
//! pmgctl remote --url https://portal.example --user operator backup
//! ```
//!
//! Local commands read the same `config.toml` and `PMG_*` variables as
//! `pmg-server`.

mod client;
mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pmgctl", version, about = "PMG Portal version and backup tool")]
struct Args {
  /// Path to the TOML config file.
  #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Compare the running version with the stored one; fails on a downgrade.
  Check,
  /// Record the on-disk version as the database's last-applied version.
  StampVersion,
  /// Check an archive without restoring it.
  Validate { archive: PathBuf },
  /// Write a backup archive.
  Backup {
    /// Destination file; defaults to a timestamped name in the current
    /// directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Replace the database and media with an archive's contents.
  Restore {
    archive: PathBuf,
    /// Confirm that the live database and media may be overwritten.
    #[arg(long)]
    yes:     bool,
  },
  /// Talk to a running pmg-server instead of the local database.
  Remote {
    /// Base URL of the server.
    #[arg(long, env = "PMG_URL", default_value = "http://127.0.0.1:8000")]
    url:      String,
    /// Operator username.
    #[arg(long, env = "PMG_USER")]
    user:     String,
    /// Operator password (plaintext).
    #[arg(long, env = "PMG_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    action: RemoteAction,
  },
}

#[derive(Subcommand, Debug)]
enum RemoteAction {
  /// Download a fresh backup.
  Backup {
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Upload and restore an archive.
  Restore {
    archive: PathBuf,
    #[arg(long)]
    yes:     bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  match args.command {
    Command::Validate { archive } => commands::validate(&archive),
    Command::Check => commands::check(&commands::load_config(&args.config)?).await,
    Command::StampVersion => {
      commands::stamp_version(&commands::load_config(&args.config)?).await
    }
    Command::Backup { output } => {
      commands::backup(&commands::load_config(&args.config)?, output).await
    }
    Command::Restore { archive, yes } => {
      confirm(yes)?;
      commands::restore(&commands::load_config(&args.config)?, &archive).await
    }
    Command::Remote { url, user, password, action } => {
      let client = ApiClient::new(ApiConfig { base_url: url, username: user, password })?;
      match action {
        RemoteAction::Backup { output } => remote_backup(&client, output).await,
        RemoteAction::Restore { archive, yes } => {
          confirm(yes)?;
          remote_restore(&client, &archive).await
        }
      }
    }
  }
}

fn confirm(yes: bool) -> Result<()> {
  if !yes {
    anyhow::bail!(
      "restore overwrites the live database and media; re-run with --yes to proceed"
    );
  }
  Ok(())
}

// ─── Remote commands ─────────────────────────────────────────────────────────

async fn remote_backup(client: &ApiClient, output: Option<PathBuf>) -> Result<()> {
  let download = client.backup().await?;
  let path = output
    .or_else(|| download.filename.clone().map(PathBuf::from))
    .unwrap_or_else(commands::default_output);

  tokio::fs::write(&path, &download.bytes)
    .await
    .with_context(|| format!("writing {}", path.display()))?;

  println!("{}", path.display());
  if let Some(sha256) = download.sha256 {
    println!("sha256 {sha256}");
  }
  Ok(())
}

async fn remote_restore(client: &ApiClient, archive: &std::path::Path) -> Result<()> {
  let bytes = tokio::fs::read(archive)
    .await
    .with_context(|| format!("reading {}", archive.display()))?;
  let restored = client.restore(bytes).await?;
  println!(
    "restored (format {}, app version {})",
    restored.format_version,
    commands::display_version(&restored.app_version)
  );
  Ok(())
}
