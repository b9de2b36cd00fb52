//! pulse-server binary.
//!
//! Reads `server.toml` (or the path specified with `--config`), layers
//! `PULSE_SERVER_*` environment variables on top, and serves the push
//! channel over HTTP.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use pulse_server::{AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pulse push-channel server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "server.toml")]
  config: PathBuf,
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

  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")
    .and_then(|b| b.set_default("port", 8001))
    .context("failed to set config defaults")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PULSE_SERVER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.publish_key.is_empty() {
    tracing::warn!("publish_key is empty; /internal/* will reject every request");
  }
  tracing::info!(tokens = server_cfg.tokens.len(), "session tokens loaded");

  let app = pulse_server::router(AppState::new(&server_cfg));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
