//! Mapping from AirGradient measurement fields to Prometheus series.

use airgradient_common::Measurement;

/// Label name carrying the device identifier on every series.
pub const DEVICE_LABEL: &str = "mac";

/// Gauge series, one per measurement field except `boot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GaugeSeries {
    Atmp,
    Rco2,
    Rhum,
    Pm01,
    Pm25,
    Pm10,
    Pm03,
    Tvoc,
    Nox,
    Rssi,
}

impl GaugeSeries {
    /// Every gauge series, in registration order.
    pub const ALL: [GaugeSeries; 10] = [
        GaugeSeries::Atmp,
        GaugeSeries::Rco2,
        GaugeSeries::Rhum,
        GaugeSeries::Pm01,
        GaugeSeries::Pm25,
        GaugeSeries::Pm10,
        GaugeSeries::Pm03,
        GaugeSeries::Tvoc,
        GaugeSeries::Nox,
        GaugeSeries::Rssi,
    ];

    /// Series name without the namespace prefix.
    pub fn name(&self) -> &'static str {
        match self {
            GaugeSeries::Atmp => "atmp",
            GaugeSeries::Rco2 => "rco2",
            GaugeSeries::Rhum => "rhum",
            GaugeSeries::Pm01 => "pm01",
            GaugeSeries::Pm25 => "pm25",
            GaugeSeries::Pm10 => "pm10",
            GaugeSeries::Pm03 => "pm03",
            GaugeSeries::Tvoc => "tvoc",
            GaugeSeries::Nox => "nox",
            GaugeSeries::Rssi => "rssi",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            GaugeSeries::Atmp => "Ambient temperature",
            GaugeSeries::Rco2 => "Relative CO2 level",
            GaugeSeries::Rhum => "Relative humidity",
            GaugeSeries::Pm01 => "Ultrafine particles",
            GaugeSeries::Pm25 => "Fine particles",
            GaugeSeries::Pm10 => "Coarse particles",
            GaugeSeries::Pm03 => "Number of particles with diameter > 0.3 µm in 100 cm³ of air",
            GaugeSeries::Tvoc => "TVOC (Total Volatile Organic Compounds) index",
            GaugeSeries::Nox => "NOx index (Nitrogen Oxide and dioxide)",
            GaugeSeries::Rssi => "WiFi RSSI",
        }
    }

    /// Position in [`GaugeSeries::ALL`].
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Read this series' value out of a measurement.
    pub fn value_of(&self, m: &Measurement) -> f64 {
        match self {
            GaugeSeries::Atmp => m.atmp,
            GaugeSeries::Rco2 => m.rco2 as f64,
            GaugeSeries::Rhum => m.rhum as f64,
            GaugeSeries::Pm01 => m.pm01 as f64,
            GaugeSeries::Pm25 => m.pm02 as f64,
            GaugeSeries::Pm10 => m.pm10 as f64,
            GaugeSeries::Pm03 => m.pm003_count as f64,
            GaugeSeries::Tvoc => m.tvoc_index as f64,
            GaugeSeries::Nox => m.nox_index as f64,
            GaugeSeries::Rssi => m.wifi_rssi as f64,
        }
    }
}

/// Counter series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterSeries {
    Boot,
}

impl CounterSeries {
    pub const ALL: [CounterSeries; 1] = [CounterSeries::Boot];

    /// Series name without the namespace prefix or `_total` suffix.
    pub fn name(&self) -> &'static str {
        match self {
            CounterSeries::Boot => "boot",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            CounterSeries::Boot => "Number of loop iterations since boot",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }

    /// Increment carried by a measurement.
    pub fn delta_of(&self, m: &Measurement) -> f64 {
        match self {
            CounterSeries::Boot => m.boot as f64,
        }
    }
}

/// Check that a namespace prefix is a valid Prometheus metric name.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
