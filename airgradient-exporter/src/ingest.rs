//! Decoding of device reports into registry writes.

use airgradient_common::{DeviceId, Measurement};
use thiserror::Error;
use tracing::{Level, debug, info};

use crate::registry::SharedRegistry;

/// Errors raised while ingesting a device report.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The body is not a well-formed measurement.
    #[error("Malformed measurement: {source}")]
    Malformed {
        /// The offending body, lossily decoded for logging.
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Routes decoded measurements into the metric registry.
#[derive(Debug, Clone)]
pub struct MeasurementIngestor {
    registry: SharedRegistry,
}

impl MeasurementIngestor {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Decode `body` and write it under `device`.
    ///
    /// Nothing is written when decoding fails.
    pub fn ingest(&self, device: &DeviceId, body: &[u8]) -> Result<(), IngestError> {
        let measurement = Measurement::from_json(body).map_err(|source| IngestError::Malformed {
            body: String::from_utf8_lossy(body).into_owned(),
            source,
        })?;

        self.registry.record(device, &measurement);

        if tracing::enabled!(Level::DEBUG) {
            debug!(mac = %device, measurement = ?measurement, "Received measurement");
        } else {
            info!(mac = %device, "Received measurement");
        }

        Ok(())
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}
