mod api;
mod app;
mod cache;
mod commands;
mod config;
mod migration;
mod stores;
mod validators;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "growdesk")]
#[command(about = "Command-line client for the GrowDesk help desk")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/growdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the cache in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to $XDG_DATA_HOME/growdesk/growdesk.log so stdout stays clean.
///
/// The filter comes from GROWDESK_LOG (default "info").
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("growdesk");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &dir,
    "growdesk.log",
  ));
  let filter = EnvFilter::try_from_env("GROWDESK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let mut app = app::App::new(config, args.ephemeral).await?;
  commands::execute(&mut app, args.command).await?;

  Ok(())
}
