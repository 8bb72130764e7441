use serde::{Deserialize, Serialize};

/// Runtime configuration served to devices on `/sensors/{mac}/one/config`.
///
/// Serialized with camelCase keys. `model` and `mqttBrokerUrl` are left
/// out of the document entirely when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Country code. With "US" the device displays Fahrenheit.
    pub country: String,

    /// PM standard for the display.
    ///
    /// "ugm3" shows µg/m³; any other value (including empty) shows US AQI.
    pub pm_standard: String,

    /// Ask the device to run a CO2 calibration.
    pub co2_calibration_requested: bool,

    /// Ask the device to run an LED bar test.
    pub led_bar_test_requested: bool,

    /// LED bar mode: "off", "co2" or "pm".
    pub led_bar_mode: String,

    /// Device model.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// MQTT broker address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mqtt_broker_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            country: "US".to_string(),
            pm_standard: String::new(),
            co2_calibration_requested: false,
            led_bar_test_requested: false,
            led_bar_mode: "off".to_string(),
            model: String::new(),
            mqtt_broker_url: String::new(),
        }
    }
}

impl ServerConfig {
    /// Encode as the JSON document devices expect.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
