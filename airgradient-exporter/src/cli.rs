//! Command-line and environment overrides.
//!
//! Precedence is flag, then environment, then config file, then default.

use std::path::PathBuf;

use airgradient_common::LogFormat;
use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::config::{ConfigError, ExporterConfig};

/// AirGradient metric destination and exporter for Prometheus.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "airgradient-exporter")]
#[command(about = "AirGradient metric destination and exporter for Prometheus")]
#[command(version)]
pub struct ExporterArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, env = "AIRGRADIENT_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address or hostname to listen on [default: 0.0.0.0].
    #[arg(long, env = "AIRGRADIENT_EXPORTER_ADDRESS")]
    pub address: Option<String>,

    /// Port to listen on [default: 10000].
    #[arg(long, env = "AIRGRADIENT_EXPORTER_PORT")]
    pub port: Option<u16>,

    /// HTTP path to expose metrics on [default: /metrics].
    #[arg(long, env = "AIRGRADIENT_EXPORTER_PATH")]
    pub path: Option<String>,

    /// AirGradient config country code [default: US].
    #[arg(long, env = "AIRGRADIENT_EXPORTER_AG_COUNTRY")]
    pub ag_country: Option<String>,

    /// AirGradient config PM standard. Empty uses US AQI, 'ugm3' uses µg/m³.
    #[arg(long, env = "AIRGRADIENT_EXPORTER_AG_PM_STANDARD")]
    pub ag_pm_standard: Option<String>,

    /// AirGradient config CO2 calibration requested.
    #[arg(
        long,
        env = "AIRGRADIENT_EXPORTER_AG_CO2_CALIBRATION_REQUESTED",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub ag_co2_calibration_requested: Option<bool>,

    /// AirGradient config LED bar test requested.
    #[arg(
        long,
        env = "AIRGRADIENT_EXPORTER_AG_LED_BAR_TEST_REQUESTED",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub ag_led_bar_test_requested: Option<bool>,

    /// AirGradient config LED bar mode: 'off', 'co2' or 'pm' [default: off].
    #[arg(long, env = "AIRGRADIENT_EXPORTER_AG_LED_BAR_MODE")]
    pub ag_led_bar_mode: Option<String>,

    /// AirGradient config device model.
    #[arg(long, env = "AIRGRADIENT_EXPORTER_AG_MODEL")]
    pub ag_model: Option<String>,

    /// AirGradient config MQTT broker address.
    #[arg(long, env = "AIRGRADIENT_EXPORTER_AG_MQTT_BROKER_URL")]
    pub ag_mqtt_broker_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (text, json).
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl ExporterArgs {
    /// Resolve the effective configuration.
    ///
    /// Loads the config file when one is given, applies overrides and
    /// validates the result.
    pub fn resolve(&self) -> Result<ExporterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::load_from_file(path)?,
            None => ExporterConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Overwrite every setting that was given as a flag or variable.
    pub fn apply(&self, config: &mut ExporterConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut config.http.address, &self.address);
        set(&mut config.http.port, &self.port);
        set(&mut config.http.path, &self.path);

        let device = &mut config.device;
        set(&mut device.country, &self.ag_country);
        set(&mut device.pm_standard, &self.ag_pm_standard);
        set(
            &mut device.co2_calibration_requested,
            &self.ag_co2_calibration_requested,
        );
        set(
            &mut device.led_bar_test_requested,
            &self.ag_led_bar_test_requested,
        );
        set(&mut device.led_bar_mode, &self.ag_led_bar_mode);
        set(&mut device.model, &self.ag_model);
        set(&mut device.mqtt_broker_url, &self.ag_mqtt_broker_url);

        set(&mut config.logging.level, &self.log_level);
        set(&mut config.logging.format, &self.log_format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSettings;

    fn parse(args: &[&str]) -> ExporterArgs {
        let mut argv = vec!["airgradient-exporter"];
        argv.extend_from_slice(args);
        ExporterArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_no_flags_keeps_defaults() {
        let mut config = ExporterConfig::default();
        ExporterArgs::default().apply(&mut config);

        assert_eq!(config.http.address, "0.0.0.0");
        assert_eq!(config.http.port, 10000);
        assert_eq!(config.http.path, "/metrics");
        assert_eq!(config.device, DeviceSettings::default());
    }

    #[test]
    fn test_flags_override() {
        let args = parse(&[
            "--address",
            "127.0.0.1",
            "--port",
            "9200",
            "--path",
            "/scrape",
            "--ag-country",
            "NL",
            "--ag-pm-standard",
            "ugm3",
            "--ag-led-bar-mode",
            "co2",
            "--ag-model",
            "I-9PSL",
            "--ag-mqtt-broker-url",
            "mqtt://broker:1883",
            "--log-format",
            "json",
        ]);
        let mut config = ExporterConfig::default();
        args.apply(&mut config);

        assert_eq!(config.http.address, "127.0.0.1");
        assert_eq!(config.http.port, 9200);
        assert_eq!(config.http.path, "/scrape");
        assert_eq!(config.device.country, "NL");
        assert_eq!(config.device.pm_standard, "ugm3");
        assert_eq!(config.device.led_bar_mode, "co2");
        assert_eq!(config.device.model, "I-9PSL");
        assert_eq!(config.device.mqtt_broker_url, "mqtt://broker:1883");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_bare_bool_flags() {
        let args = parse(&[
            "--ag-co2-calibration-requested",
            "--ag-led-bar-test-requested=false",
        ]);
        assert_eq!(args.ag_co2_calibration_requested, Some(true));
        assert_eq!(args.ag_led_bar_test_requested, Some(false));
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.json5");
        std::fs::write(
            &path,
            r#"{ http: { port: 10001, path: "/from-file" }, device: { country: "FR" } }"#,
        )
        .unwrap();

        let path_str = path.to_str().unwrap();
        let args = parse(&["--config", path_str, "--port", "10002"]);
        let config = args.resolve().unwrap();

        assert_eq!(config.http.port, 10002);
        assert_eq!(config.http.path, "/from-file");
        assert_eq!(config.device.country, "FR");
    }

    #[test]
    fn test_resolve_rejects_invalid_override() {
        let args = parse(&["--path", "metrics"]);
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_invalid_port_flag() {
        let argv = ["airgradient-exporter", "--port", "not-a-port"];
        assert!(ExporterArgs::try_parse_from(argv).is_err());
    }
}
