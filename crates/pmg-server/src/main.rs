//! pmg-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `PMG_*`
//! environment variables, connects to the portal database lazily, and
//! serves the operator backup endpoints behind the version gate.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p pmg-server -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use pmg_backup::{
  Backups,
  tool::{MigrationRunner, PgTools},
};
use pmg_core::probe::VersionProbe;
use pmg_server::{AppState, ServerConfig, auth::AuthConfig, gate::CompatibilityGate};
use pmg_store_pg::PgVersionStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "PMG Portal backup server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PMG")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store = Arc::new(
    PgVersionStore::open_lazy(&server_cfg.database)
      .context("failed to configure version store")?,
  );
  let probe: Arc<dyn VersionProbe> = Arc::new(server_cfg.version_probe());
  match probe.current_version() {
    Some(version) => tracing::info!(%version, "running version"),
    None => tracing::warn!("no VERSION file found; running version unknown"),
  }

  let tools = &server_cfg.backup.tools;
  let db_tool = PgTools::new(server_cfg.database.clone(), tools)
    .context("failed to configure database tools")?;
  let backups = Backups::new(
    db_tool,
    store.clone(),
    probe.clone(),
    MigrationRunner::from_config(tools),
    server_cfg.backup.media_root.clone(),
  );

  let state = AppState {
    backups:          Arc::new(backups),
    gate:             Arc::new(CompatibilityGate::new(store.clone(), probe.clone())),
    store,
    probe,
    auth:             Arc::new(AuthConfig {
      username:      server_cfg.auth_username.clone(),
      password_hash: server_cfg.auth_password_hash.clone(),
    }),
    max_upload_bytes: server_cfg.max_upload_bytes,
  };

  let app = pmg_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
