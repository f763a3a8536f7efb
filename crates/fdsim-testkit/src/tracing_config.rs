//! Tracing setup for test output.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info,fdsim=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize compact tracing output for tests.
///
/// Safe to call from every test; only the first call in a process installs
/// the subscriber. `RUST_LOG` overrides the default `info,fdsim=debug`.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn my_test() {
///     fdsim_testkit::init_test_tracing();
///     // ... test code
/// }
/// ```
pub fn init_test_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_ansi(true)
                    .compact(),
            )
            .init();
    });
}

/// Initialize tracing with an explicit filter, ignoring `RUST_LOG`.
pub fn init_test_tracing_with_filter(filter: &str) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_ansi(true)
                    .compact(),
            )
            .init();
    });
}

/// Initialize tracing with JSON lines, for tests whose logs are post-processed.
pub fn init_test_tracing_json() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_test_writer().json())
            .init();
    });
}

/// Suppress all output (for tests that deliberately provoke warnings).
pub fn init_test_tracing_silent() {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(EnvFilter::new("off"))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}
