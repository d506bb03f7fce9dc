//! Tracing initialization

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{Error, Result};

/// Initialize JSON-formatted tracing output.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the configured
/// log level. Call once at startup, before [`crate::server::App::start`].
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init()
        .map_err(|err| Error::Internal(format!("failed to initialize tracing: {err}")))?;

    tracing::info!(
        service = %config.service.name,
        level = %config.service.log_level,
        "tracing initialized"
    );
    Ok(())
}
