//! Tracing subscriber setup for the `vouch` binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "vouch=info";
const VERBOSE_LOG_FILTER: &str = "vouch=debug";

/// Installs a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects between info and
/// debug output for this crate. Installing twice is a no-op.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { VERBOSE_LOG_FILTER } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
