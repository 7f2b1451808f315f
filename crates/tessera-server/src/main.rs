//! tessera server binary.
//!
//! Reads `tessera.toml` (or the path given with `--config`) layered under
//! `TESSERA_*` environment variables, opens the SQLite store and serves the
//! registry API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `staff_password_hash`:
//!
//! ```text
//! cargo run -p tessera-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tessera_api::ApiState;
use tessera_core::ticket::DEFAULT_SCAN_DAYS;
use tessera_server::{ServerConfig, auth};
use tessera_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "tessera member registry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tessera.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = auth::hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "tessera.db")?
    .set_default("utc_offset_minutes", 60)?
    .set_default("ticket_scan_days", i64::from(DEFAULT_SCAN_DAYS))?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TESSERA"))
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Fix the registry's time zone.
  let calendar = server_cfg.calendar().context("invalid utc_offset_minutes")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build application state.
  let state = ApiState::new(Arc::new(store), calendar)
    .with_ticket_scan_days(server_cfg.ticket_scan_days);
  let app = tessera_server::router(state, Arc::new(server_cfg.auth()));

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!(
    utc_offset_minutes = server_cfg.utc_offset_minutes,
    scan_days = server_cfg.ticket_scan_days,
    "listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
