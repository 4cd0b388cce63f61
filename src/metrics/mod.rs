use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref APPLIED_COMMANDS: IntCounterVec = IntCounterVec::new(
        Opts::new("applied_commands", "Commands applied to the local store"),
        &["store", "verb"]
    )
    .expect("metric can not be created");

    pub static ref FAILED_APPLIES: IntCounterVec = IntCounterVec::new(
        Opts::new("failed_applies", "Committed entries whose save failed"),
        &["node_id"]
    )
    .expect("metric can not be created");

    pub static ref SNAPSHOT_SIZE_IN_BYTES_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("snapshot_size_bytes", "Size of backup blobs in bytes")
            .buckets(exponential_buckets(1024.0, 4.0, 10).expect("valid buckets")),
        &["store"]
    )
    .expect("metric can not be created");

    pub static ref RESTORED_KEYS: IntCounterVec = IntCounterVec::new(
        Opts::new("restored_keys", "Keys imported by restore"),
        &["store"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(APPLIED_COMMANDS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(FAILED_APPLIES.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(SNAPSHOT_SIZE_IN_BYTES_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(RESTORED_KEYS.clone()))
            .expect("collector can be registered");
    });
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    register_custom_metrics();

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
