//! visitdesk server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), overlays
//! `VISITDESK_*` environment variables (`VISITDESK_STORE__PATH`, ...), opens
//! the configured store and serves the REST API over HTTP.
//!
//! # Seeding a password
//!
//! ```
//! cargo run -p visitdesk-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use visitdesk_api::{ApiOptions, AppState, Notifier};
use visitdesk_core::store::VisitStore;
use visitdesk_server::{
  Backend, MailConfig, ServerConfig, app,
  mailer::{LogMailer, RelayMailer},
};
use visitdesk_store_memory::MemoryStore;
use visitdesk_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "visitdesk reception server")]
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
    let hash = visitdesk_api::session::hash_password(&password)
      .context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("VISITDESK")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let notifier = notifier(&server_cfg.mail)?;

  match server_cfg.store.backend {
    Backend::Sqlite => {
      let path = expand_tilde(&server_cfg.store.path);
      if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
          .with_context(|| format!("failed to create {dir:?}"))?;
      }
      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?;
      serve(&server_cfg, store, notifier).await
    }
    Backend::Memory => {
      tracing::warn!("using the in-memory store; data is lost on exit");
      serve(&server_cfg, MemoryStore::new(), notifier).await
    }
  }
}

async fn serve<S>(cfg: &ServerConfig, store: S, notifier: Notifier) -> anyhow::Result<()>
where
  S: VisitStore + 'static,
{
  let state = AppState::new(Arc::new(store), notifier)
    .with_options(ApiOptions { attach_badge: cfg.mail.attach_badge });

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(state)).await.context("server error")?;
  Ok(())
}

/// Pick the mail transport: an HTTP relay when configured, the log otherwise.
fn notifier(mail: &MailConfig) -> anyhow::Result<Notifier> {
  Ok(match &mail.relay_url {
    Some(url) => {
      tracing::info!(relay = %url, "mail relay enabled");
      let mailer = RelayMailer::new(url.clone(), mail.from.clone())
        .context("failed to build mail relay client")?;
      Notifier::spawn(mailer)
    }
    None => Notifier::spawn(LogMailer { from: mail.from.clone() }),
  })
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
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
