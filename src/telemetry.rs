//! Diagnostic logging setup.
//!
//! Human-readable console output only — this daemon has no request-scoped spans worth
//! exporting to a trace backend, so there's no OpenTelemetry layer here, just a
//! `tracing-subscriber` `fmt` layer gated by an `EnvFilter`.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_level` when set, matching the usual `tracing` startup
/// convention.
pub fn init(default_level: Level) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}
