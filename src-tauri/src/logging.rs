// Logging setup - stdout plus an optional on-disk live log

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::ScoutConfig;
use crate::error::Result;

pub const LIVE_LOG_NAME: &str = "gameflow-scout-live.log";

pub fn logs_dir(data_dir: &Path) -> PathBuf {
  data_dir.join("logs")
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Calling this twice is harmless; the second call keeps the first subscriber.
pub fn init_logging(config: &ScoutConfig, data_dir: &Path) -> Result<()> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

  let file_layer = if config.log_to_file {
    let dir = logs_dir(data_dir);
    std::fs::create_dir_all(&dir)?;
    let live_log = File::options()
      .create(true)
      .append(true)
      .open(dir.join(LIVE_LOG_NAME))?;
    Some(
      tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(live_log)),
    )
  } else {
    None
  };

  let installed = tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_target(true))
    .with(file_layer)
    .try_init();

  if installed.is_err() {
    tracing::debug!(target: "gameflow::logging", "subscriber already installed");
  }
  Ok(())
}
