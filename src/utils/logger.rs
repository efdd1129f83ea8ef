use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info";

/// Sends all tracing output to a timestamped file in `log_dir`
pub fn init_logger(log_dir: &str) -> Result<()> {
    if !Path::new(log_dir).exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir))?;
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file = format!("{}/redirect_manager_{}.log", log_dir, timestamp);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_ansi(false)
        .with_writer(fs::File::create(&log_file).with_context(|| format!("Failed to create {}", log_file))?)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!("Logger initialized, writing to {}", log_file);

    Ok(())
}
