//! AirGradient Common Library
//!
//! This crate provides the device-facing types shared by the exporter:
//!
//! - [`measurement`] - The measurement report pushed by sensors (`Measurement`)
//! - [`device`] - Device identifiers derived from request paths (`DeviceId`)
//! - [`server_config`] - The runtime configuration served to devices (`ServerConfig`)
//! - [`config`] - Logging configuration and JSON5 loading helpers
//! - [`error`] - Error types

pub mod config;
pub mod device;
pub mod error;
pub mod measurement;
pub mod server_config;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use device::{DEVICE_ID_PREFIX, DeviceId};
pub use error::{Error, Result};
pub use measurement::Measurement;
pub use server_config::ServerConfig;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use airgradient_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
