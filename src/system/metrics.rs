//! Metrics collection for Wardrobe
//!
//! Prometheus counters registered once in a crate-local registry. Recording is
//! a no-op when registration failed, so metrics never break a command.

use crate::core::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, IntCounter,
    IntCounterVec, Registry,
};
use tracing::warn;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Counters for the command surface and the codec
pub struct Metrics {
    /// Command results, labelled by command and result code
    pub command_results: IntCounterVec,
    /// Blobs that failed to decode
    pub decode_failures: IntCounter,
    /// Blobs that decoded from an older wire version
    pub migrations: IntCounter,
    /// Successful design mutations
    pub design_mutations: IntCounter,
}

impl Metrics {
    /// Create and register all counters
    fn new() -> Result<Self> {
        Ok(Self {
            command_results: register_int_counter_vec_with_registry!(
                "wardrobe_command_results_total",
                "Command results by command and result code",
                &["command", "code"],
                REGISTRY
            )?,
            decode_failures: register_int_counter_with_registry!(
                "wardrobe_decode_failures_total",
                "Design blobs that failed to decode",
                REGISTRY
            )?,
            migrations: register_int_counter_with_registry!(
                "wardrobe_blob_migrations_total",
                "Design blobs migrated from an older wire version",
                REGISTRY
            )?,
            design_mutations: register_int_counter_with_registry!(
                "wardrobe_design_mutations_total",
                "Successful design document mutations",
                REGISTRY
            )?,
        })
    }

    /// Get the global metrics instance, `None` if registration failed
    pub fn global() -> Option<&'static Metrics> {
        static INSTANCE: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Failed to register metrics: {}", e);
                None
            }
        });
        INSTANCE.as_ref()
    }

    /// Count one command result
    pub fn record_command(&self, command: &str, code: &str) {
        self.command_results.with_label_values(&[command, code]).inc();
    }
}

/// Register all metrics up front
pub fn init_registry() {
    let _ = Metrics::global();
}

/// The registry holding all Wardrobe metrics
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Render all metrics in the Prometheus text exposition format
pub fn collect_metrics() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry().gather();
    Ok(encoder.encode_to_string(&metric_families)?)
}
