//! The `DEBUG_PG_SERVER` verbosity toggle.
//!
//! Sessions and the proxy log every decoded message at `tracing::Level::TRACE`
//! by default. Setting `DEBUG_PG_SERVER=1` (or [`Config::debug`](crate::config::Config::debug))
//! raises that to `DEBUG` so message-level tracing shows up under a plain
//! `RUST_LOG=pgbackend=debug` filter without needing `=trace`.

use std::env;
use std::sync::OnceLock;

use tracing::Level;

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Read `DEBUG_PG_SERVER` once and cache the result.
fn env_enabled() -> bool {
    *DEBUG_ENABLED.get_or_init(|| {
        env::var("DEBUG_PG_SERVER")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    })
}

/// The level per-message protocol tracing should be emitted at: `DEBUG` if
/// `DEBUG_PG_SERVER` is set or `enabled` is `true`, `TRACE` otherwise.
pub fn message_trace_level(enabled: bool) -> Level {
    if enabled || env_enabled() {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}
