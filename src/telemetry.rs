//! Log output for a run.
//!
//! [`dispatch`] builds a subscriber without installing it globally. Callers
//! scope it to a run with `tracing::dispatcher::with_default`, so libraries
//! and tests never inherit process-wide logging state.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,

    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Build a stderr subscriber in the given format.
///
/// Respects `RUST_LOG`; falls back to `info`.
pub fn dispatch(format: LogFormat) -> Dispatch {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => Dispatch::new(
            registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        ),
        LogFormat::Json => Dispatch::new(
            registry.with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    }
}
