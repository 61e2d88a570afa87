//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`; user-facing output stays on
//! the notifier. Verbosity comes from `KSAIL_LOG` (or `RUST_LOG`), falling
//! back to the `--verbosity` flag.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber for the whole process.
pub fn init_logging(level: &str) -> Result<()> {
    // Validate early so a typo in --verbosity fails loudly
    parse_log_level(level)?;

    let env_filter = EnvFilter::try_from_env("KSAIL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_timer(fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

/// Parse a log level string into a tracing level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("invalid log level: {level}"),
    }
}
