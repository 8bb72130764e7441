//! Configuration for the AirGradient exporter.

use std::net::SocketAddr;
use std::path::Path;

use airgradient_common::{LoggingConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapping::is_valid_prefix;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] airgradient_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Settings served to devices.
    #[serde(default)]
    pub device: DeviceSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener and scrape endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address or hostname to listen on (default: "0.0.0.0").
    #[serde(default = "default_address")]
    pub address: String,

    /// Port to listen on (default: 10000).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric name prefix (default: "airgradient").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "airgradient".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            path: default_path(),
            prefix: default_prefix(),
        }
    }
}

impl HttpConfig {
    /// Resolve the socket address to bind.
    ///
    /// IP literals are used as given; hostnames resolve to their first address.
    pub async fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let unresolved = || {
            ConfigError::Validation(format!(
                "Cannot resolve listen address: {}",
                self.address
            ))
        };

        tokio::net::lookup_host((self.address.as_str(), self.port))
            .await
            .map_err(|_| unresolved())?
            .next()
            .ok_or_else(unresolved)
    }
}

/// Operator settings handed to devices on config fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Country code (default: "US").
    #[serde(default = "default_country")]
    pub country: String,

    /// PM standard. Empty keeps US AQI, "ugm3" switches to µg/m³.
    #[serde(default)]
    pub pm_standard: String,

    #[serde(default)]
    pub co2_calibration_requested: bool,

    #[serde(default)]
    pub led_bar_test_requested: bool,

    /// LED bar mode: "off", "co2" or "pm" (default: "off").
    #[serde(default = "default_led_bar_mode")]
    pub led_bar_mode: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub mqtt_broker_url: String,
}

fn default_country() -> String {
    "US".to_string()
}

fn default_led_bar_mode() -> String {
    "off".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            country: default_country(),
            pm_standard: String::new(),
            co2_calibration_requested: false,
            led_bar_test_requested: false,
            led_bar_mode: default_led_bar_mode(),
            model: String::new(),
            mqtt_broker_url: String::new(),
        }
    }
}

impl DeviceSettings {
    /// Build the document served to a device.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            country: self.country.clone(),
            pm_standard: self.pm_standard.clone(),
            co2_calibration_requested: self.co2_calibration_requested,
            led_bar_test_requested: self.led_bar_test_requested,
            led_bar_mode: self.led_bar_mode.clone(),
            model: self.model.clone(),
            mqtt_broker_url: self.mqtt_broker_url.clone(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = airgradient_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = airgradient_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Listen address must not be empty".to_string(),
            ));
        }

        if self.http.port == 0 {
            return Err(ConfigError::Validation("port must be > 0".to_string()));
        }

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.http.path == "/health"
            || self.http.path.starts_with("/sensors/")
            || self.http.path.contains([':', '*'])
        {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} collides with a device route",
                self.http.path
            )));
        }

        if !is_valid_prefix(&self.http.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {}",
                self.http.prefix
            )));
        }

        Ok(())
    }
}
