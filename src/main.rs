use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use redirect_manager::api::config::ApiConfig;
use redirect_manager::api::{start_server, AppState};
use redirect_manager::utils::logger::init_logger;

/// Serves stored redirects and the admin API
#[derive(Debug, Parser)]
#[command(name = "redirect_manager", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Answer with temporary redirects so browsers do not cache them
    #[arg(long)]
    development: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ApiConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.development |= args.development;

    init_logger(&config.log_dir)?;
    info!(
        "Starting redirect manager on {}:{} (development: {})",
        config.host, config.port, config.development
    );

    let state = AppState::from_config(config).context("Failed to set up redirect storage")?;
    if let Err(e) = start_server(state).await {
        error!("Server stopped with an error: {:#}", e);
        return Err(e);
    }

    Ok(())
}
