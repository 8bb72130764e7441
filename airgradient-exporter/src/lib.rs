//! Prometheus exporter for AirGradient air-quality sensors.
//!
//! Devices push measurement reports over HTTP and poll for their runtime
//! configuration. Every reading is kept as a per-device series and exposed
//! on a `/metrics` endpoint for Prometheus scraping.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   AirGradient   │────>│    Ingestor     │────>│ Metric Registry │
//! │ POST /measures  │     │    (decode)     │     │ (per-device)    │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                                                          v
//!                                                 ┌─────────────────┐
//!                                                 │   HTTP Server   │
//!                                                 │   (/metrics)    │
//!                                                 └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! airgradient-exporter --port 10000 --ag-country DE
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for the file format and [`cli::ExporterArgs`]
//! for flags and environment variables.

pub mod cli;
pub mod config;
pub mod http;
pub mod ingest;
pub mod lifecycle;
pub mod mapping;
pub mod registry;

pub use cli::ExporterArgs;
pub use config::ExporterConfig;
pub use http::AppState;
pub use ingest::MeasurementIngestor;
pub use lifecycle::{HttpServer, LifecycleState};
pub use registry::{MetricRegistry, SharedRegistry};
