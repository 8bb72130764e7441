//! Metric registry holding every per-device series.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use airgradient_common::{DeviceId, Measurement};
use parking_lot::RwLock;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::{trace, warn};

use crate::mapping::{CounterSeries, GaugeSeries};

/// Label set attached to every series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct DeviceLabels {
    pub mac: String,
}

impl DeviceLabels {
    fn new(device: &str) -> Self {
        Self {
            mac: device.to_string(),
        }
    }
}

type GaugeFamily = Family<DeviceLabels, Gauge<f64, AtomicU64>>;
type CounterFamily = Family<DeviceLabels, Counter<f64, AtomicU64>>;

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Whole measurements written.
    pub measurements_recorded: u64,
    /// Counter increments refused because the delta was negative or not finite.
    pub counter_deltas_rejected: u64,
}

/// Thread-safe registry of the AirGradient series.
///
/// Series are created on the first write for a device and never removed, so
/// cardinality grows with the number of distinct devices ever seen.
pub struct MetricRegistry {
    /// Prometheus registry the families are registered in.
    registry: Registry,
    /// Gauge families indexed by [`GaugeSeries::index`].
    gauges: Vec<GaugeFamily>,
    /// Counter families indexed by [`CounterSeries::index`].
    counters: Vec<CounterFamily>,
    /// Writers hold the shared side, `render` the exclusive side.
    gate: RwLock<()>,
    /// Devices that have written at least once.
    devices: RwLock<HashSet<String>>,
    /// Statistics.
    stats: RwLock<RegistryStats>,
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricRegistry>;

impl MetricRegistry {
    /// Create a registry whose series are namespaced under `prefix`.
    pub fn new(prefix: &str) -> Self {
        let mut registry = Registry::with_prefix(prefix);

        let gauges = GaugeSeries::ALL
            .iter()
            .map(|series| {
                let family = GaugeFamily::default();
                registry.register(series.name(), series.help(), family.clone());
                family
            })
            .collect();

        let counters = CounterSeries::ALL
            .iter()
            .map(|series| {
                let family = CounterFamily::default();
                registry.register(series.name(), series.help(), family.clone());
                family
            })
            .collect();

        Self {
            registry,
            gauges,
            counters,
            gate: RwLock::new(()),
            devices: RwLock::new(HashSet::new()),
            stats: RwLock::new(RegistryStats::default()),
        }
    }

    /// Set the current value of a gauge for a device.
    ///
    /// Non-finite values are stored as received.
    pub fn set_gauge(&self, series: GaugeSeries, device: &str, value: f64) {
        let _gate = self.gate.read();
        self.track_device(device);
        self.apply_gauge(series, &DeviceLabels::new(device), value);
    }

    /// Add `delta` to a counter for a device.
    ///
    /// Negative or non-finite deltas are refused and leave the counter
    /// unchanged. Returns whether the delta was applied.
    pub fn inc_counter(&self, series: CounterSeries, device: &str, delta: f64) -> bool {
        let _gate = self.gate.read();
        self.track_device(device);
        self.apply_counter(series, &DeviceLabels::new(device), device, delta)
    }

    /// Write every field of a measurement under the device's label.
    ///
    /// A scrape observes either none or all of the writes.
    pub fn record(&self, device: &DeviceId, measurement: &Measurement) {
        let labels = DeviceLabels::new(device.as_str());

        {
            let _gate = self.gate.read();
            self.track_device(device.as_str());

            for series in GaugeSeries::ALL {
                self.apply_gauge(series, &labels, series.value_of(measurement));
            }
            for series in CounterSeries::ALL {
                self.apply_counter(
                    series,
                    &labels,
                    device.as_str(),
                    series.delta_of(measurement),
                );
            }
        }

        self.stats.write().measurements_recorded += 1;
    }

    /// Render every registered series in the OpenMetrics text format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        let _gate = self.gate.write();
        prometheus_client::encoding::text::encode(&mut output, &self.registry)?;
        Ok(output)
    }

    /// Number of distinct devices seen so far.
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Number of live series (every device owns one per gauge and counter).
    pub fn series_count(&self) -> usize {
        self.device_count() * (GaugeSeries::ALL.len() + CounterSeries::ALL.len())
    }

    /// Get registry statistics.
    pub fn stats(&self) -> RegistryStats {
        self.stats.read().clone()
    }

    fn apply_gauge(&self, series: GaugeSeries, labels: &DeviceLabels, value: f64) {
        self.gauges[series.index()].get_or_create(labels).set(value);
    }

    fn apply_counter(
        &self,
        series: CounterSeries,
        labels: &DeviceLabels,
        device: &str,
        delta: f64,
    ) -> bool {
        let family = &self.counters[series.index()];

        if !delta.is_finite() || delta < 0.0 {
            // Still materialize the series so every device exposes the full set.
            family.get_or_create(labels);
            self.stats.write().counter_deltas_rejected += 1;
            warn!(
                series = series.name(),
                mac = %device,
                delta,
                "Refusing counter increment that is negative or not finite"
            );
            return false;
        }

        family.get_or_create(labels).inc_by(delta);
        true
    }

    fn track_device(&self, device: &str) {
        if self.devices.read().contains(device) {
            return;
        }
        if self.devices.write().insert(device.to_string()) {
            trace!(mac = %device, "First write for device");
        }
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("devices", &self.device_count())
            .field("stats", &self.stats())
            .finish()
    }
}
