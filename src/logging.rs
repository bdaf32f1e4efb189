//! Tracing setup for applications embedding the engine.
//!
//! The library itself only emits `tracing` events. Embedders that don't
//! install their own subscriber can call [`init_tracing`] once at startup.

use crate::error::{DeriveError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,derivtree_rs=debug";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| DeriveError::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    tracing::debug!("Tracing initialized");
    Ok(())
}
