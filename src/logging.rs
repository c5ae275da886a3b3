//! Diagnostic logging to stderr.
//!
//! Call sites use the `info`/`warn`/`debug` helpers; `init` installs the
//! subscriber once at startup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive that overrides the
/// verbosity flag.
pub const LOG_ENV: &str = "CHATSTREAM_LOG";

/// Install the stderr subscriber. Later calls are ignored.
pub fn init(verbose: bool) {
    let default = if verbose {
        "warn,chatstream=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!("{}", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    tracing::info!("{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}
