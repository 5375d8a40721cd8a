//! IdeaFrame server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `IDEAFRAME_*` environment variables, opens the SQLite store and serves the
//! JSON API over HTTP.
//!
//! # Accounts
//!
//! Users are created from the command line; the password is read from stdin:
//!
//! ```
//! cargo run -p ideaframe-server -- add-user --login alice \
//!   --display-name "Alice" --email alice@example.com
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ideaframe_core::{store::IdeaStore, user::NewUser};
use ideaframe_server::{ServerConfig, auth};
use ideaframe_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "IdeaFrame initiative voting server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Create a user account. The password is read from stdin.
  AddUser {
    #[arg(long)]
    login:        String,
    #[arg(long)]
    display_name: String,
    #[arg(long)]
    email:        String,
  },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
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

  if let Some(Command::HashPassword) = cli.command {
    let password = read_password()?;
    println!("{}", hash(&password)?);
    return Ok(());
  }

  let config = ServerConfig::load(&cli.config).context("failed to load configuration")?;
  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Some(Command::AddUser { login, display_name, email }) => {
      let password = read_password()?;
      let user = store
        .add_user(NewUser { login, display_name, email, password_hash: hash(&password)? })
        .await
        .context("failed to create user")?;
      tracing::info!(id = %user.id, login = %user.login, "user created");
      Ok(())
    }
    _ => serve(store, &config).await,
  }
}

async fn serve(store: SqliteStore, config: &ServerConfig) -> anyhow::Result<()> {
  let app = ideaframe_server::app(Arc::new(store), config);
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn hash(password: &str) -> anyhow::Result<String> {
  auth::hash_password(password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))
}

/// Read a single line from stdin without the trailing newline.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_string();
  anyhow::ensure!(!password.is_empty(), "password must not be empty");
  Ok(password)
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
