//! `pulse` — watch a user's live notifications and activity feed.
//!
//! # Usage
//!
//! ```
//! pulse --url http://localhost:8000 --token <session token>
//! pulse --config ~/.config/pulse/config.toml
//! ```
//!
//! Any setting may also come from `PULSE_*` environment variables
//! (`PULSE_TOKEN`, `PULSE_BASE_URL`, ...). Flags win over both.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_client::{ClientConfig, Session};
use pulse_core::event::InboundEvent;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pulse", about = "Live notifications and activity feed")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the REST API (default: http://localhost:8000).
  #[arg(long)]
  url: Option<String>,

  /// Push channel URL; derived from --url when omitted.
  #[arg(long)]
  ws_url: Option<String>,

  /// Session token issued at login.
  #[arg(long)]
  token: Option<String>,

  /// Only show feed posts by this user.
  #[arg(long)]
  author: Option<u64>,
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
    .init();

  let args = Args::parse();

  // CLI flags override the config file and environment.
  let mut config = ClientConfig::load(args.config.as_deref()).context("loading configuration")?;
  if let Some(url) = args.url {
    config.base_url = url;
  }
  if args.ws_url.is_some() {
    config.ws_url = args.ws_url;
  }
  if let Some(token) = args.token {
    config.token = token;
  }
  if config.token.is_empty() {
    anyhow::bail!("no session token; pass --token or set PULSE_TOKEN");
  }

  let session = Session::from_config(&config).context("building session")?;

  let _events = session.bus().subscribe(|event: &InboundEvent| {
    info!(kind = event.kind().as_str(), "event received");
  });

  let mut visible = session.notifications().watch();
  tokio::spawn(async move {
    while visible.changed().await.is_ok() {
      let list = visible.borrow_and_update().clone();
      println!("── {} notification(s) ──", list.len());
      for item in list.iter() {
        let link = item.link.as_deref().unwrap_or("-");
        println!("  {}  {}  ({link})", item.created_at.format("%Y-%m-%d %H:%M"), item.content);
      }
    }
  });

  let mut page = session.feed().page();
  tokio::spawn(async move {
    while page.changed().await.is_ok() {
      let current = page.borrow_and_update().clone();
      println!("── feed: {} post(s) ──", current.posts.len());
      for post in &current.posts {
        println!("  #{} {}: {}", post.id, post.user_name, post.content);
      }
    }
  });

  if let Some(author) = args.author {
    let mut filter = session.feed().filter();
    filter.author = Some(author);
    session.feed().set_filter(filter);
  } else {
    session.feed().refresh();
  }

  session.start().await;
  info!("listening; press Ctrl-C to quit");

  tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
  session.end().await;

  Ok(())
}
