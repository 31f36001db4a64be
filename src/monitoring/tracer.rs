/*!
 * Tracing Setup
 * Opt-in subscriber installation for binaries and tests using the containers
 *
 * The containers only emit events; installing a subscriber is left to the
 * embedding application. This helper covers the common case.
 */

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that switches output to JSON
pub const TRACE_JSON_ENV: &str = "HCSTL_TRACE_JSON";

/// Install a global tracing subscriber
///
/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - HCSTL_TRACE_JSON: `1` or `true` for JSON output (default: false)
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Tracing initialized");
    }
    installed
}
