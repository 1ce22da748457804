//! Logging initialization for the CLI.
//!
//! Diagnostics go through `tracing` and are written to stderr. Progress bars
//! and the interactive prompts are the primary output, so the default level
//! is quiet and each `-v` raises it by one step.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize the tracing subscriber.
///
/// The level can be overridden at runtime via the `RUST_LOG` environment variable.
pub fn init(verbosity: u8) {
    let level = level_for(verbosity).as_str().to_lowercase();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("imgflow={level},imgflow_core={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();
}
