//! System utilities and monitoring

pub mod metrics;

pub use metrics::{collect_metrics, init_registry, Metrics};
