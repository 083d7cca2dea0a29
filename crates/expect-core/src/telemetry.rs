//! Tracing initialisation for drivers embedding the engine.
//!
//! The engine emits `tracing` events (`debug` per test, `trace` per signal,
//! `warn` for failures without a location). Call [`init_tracing`] once at
//! program start to see them.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `level`. Later calls are ignored.
pub fn init_tracing(level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}
