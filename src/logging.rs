use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file name inside the cache directory.
pub const LOG_FILE: &str = "jwx.log";

/// Environment variable holding the file log filter.
pub const LOG_ENV: &str = "JWX_LOG";

/// Install the global subscriber.
///
/// Everything at `JWX_LOG` level (default `info`) goes to `<dir>/jwx.log`
/// when a directory is given; warnings also go to stderr, errors only when
/// `quiet`. Keep the returned guard alive until exit or buffered lines are
/// lost.
pub fn init(dir: Option<&Path>, quiet: bool) -> Result<Option<WorkerGuard>> {
  let (file_layer, guard) = match dir {
    Some(dir) => {
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
      let appender = tracing_appender::rolling::never(dir, LOG_FILE);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
      let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  let stderr_level = if quiet { "error" } else { "warn" };
  let stderr_layer = fmt::layer()
    .compact()
    .with_target(false)
    .with_writer(std::io::stderr)
    .with_filter(EnvFilter::new(stderr_level));

  tracing_subscriber::registry()
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
