use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,ard=info";

/// Initialize the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default filter; `verbose` overrides both and
/// enables debug output for the toolchain crates.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,ard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    // A second initialization (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
