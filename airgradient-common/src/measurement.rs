use serde::{Deserialize, Serialize};

/// A single report pushed by a sensor to `/sensors/{mac}/measures`.
///
/// Every field is required. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// WiFi signal strength in dBm.
    #[serde(rename = "wifi")]
    pub wifi_rssi: i64,

    /// Relative CO2 level in ppm.
    pub rco2: i64,

    /// Ultrafine particles (PM1.0).
    pub pm01: i64,

    /// Fine particles (PM2.5).
    pub pm02: i64,

    /// Coarse particles (PM10).
    pub pm10: i64,

    /// Number of particles with diameter > 0.3 µm in 100 cm³ of air.
    pub pm003_count: i64,

    /// TVOC (Total Volatile Organic Compounds) index.
    pub tvoc_index: i64,

    /// NOx index (Nitrogen Oxide and dioxide).
    pub nox_index: i64,

    /// Ambient temperature in °C.
    pub atmp: f64,

    /// Relative humidity in percent.
    pub rhum: i64,

    /// Number of loop iterations since boot.
    pub boot: i64,
}

impl Measurement {
    /// Decode a measurement from a raw JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
