//! Log output for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "blockflow=info";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "blockflow=debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
