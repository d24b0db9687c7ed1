//! Log setup for the binaries.

use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::Error;

/// Install the global subscriber.
///
/// Logs go to stderr so that report output on stdout stays clean. The stderr
/// level comes from `RUST_LOG` if set, otherwise from `level` (e.g. "info" or
/// "card_misuse_analytics=debug"). When `log_file` is given, everything at
/// debug and above is also appended to that file.
///
/// # Errors
/// Returns [Error::Config] if `level` is not a valid filter or a subscriber
/// is already installed, and [Error::Io] if the log file cannot be opened.
pub fn setup_logging(level: &str, log_file: Option<&Path>) -> Result<(), Error> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|error| Error::Config(format!("invalid log level '{level}': {error}")))?,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .try_init()
        .map_err(|error| Error::Config(format!("could not set up logging: {error}")))
}
