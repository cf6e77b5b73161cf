//! Lightweight in-process metrics.
//!
//! Decision counters and check latency, stored as atomics and rendered in
//! Prometheus text format on demand.

pub mod metrics;

pub use metrics::{CounterVec, GatewayMetrics, HistogramVec};
