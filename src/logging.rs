//! Logging setup.
//!
//! All log output goes to stderr: stdout carries CLI results and, for
//! `errguide mcp`, the MCP JSON-RPC stream.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},error_guide={}", level, level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
