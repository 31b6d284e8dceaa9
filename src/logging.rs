//! Log output setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` overrides `default_filter`
///
/// The subscriber also picks up records from the `log` facade, which the
/// library modules log through. Calling this twice keeps the first subscriber.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
