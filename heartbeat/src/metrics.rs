use alloy::primitives::Address;
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge},
};

/// One monitored chain's state, as published in a successful heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionRecord {
    pub sender: Address,
    pub version: String,
    pub block_height: u64,
    pub node_info: String,
    pub chain_id: u64,
}

/// Receives a record per monitored chain after every successful heartbeat. Implementations must not block or fail.
pub trait HeartbeatMetrics: Send + Sync {
    fn track_emission(&self, record: &EmissionRecord);
}

/// Discards everything. Used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl HeartbeatMetrics for NoopMetrics {
    fn track_emission(&self, _: &EmissionRecord) {}
}

/// Records emissions as OpenTelemetry instruments on the global meter provider.
pub struct OtelMetrics {
    block_height: Gauge<u64>,
    emissions: Counter<u64>,
}

impl OtelMetrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("heartbeat");
        Self {
            block_height: meter
                .u64_gauge("heartbeat.emission.block_height")
                .with_description("Block height reported for a chain in the last heartbeat")
                .build(),
            emissions: meter
                .u64_counter("heartbeat.emission.count")
                .with_description("Chain states published in heartbeats")
                .build(),
        }
    }
}

impl Default for OtelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatMetrics for OtelMetrics {
    fn track_emission(&self, record: &EmissionRecord) {
        let attributes = attributes(record);
        self.block_height.record(record.block_height, &attributes);
        self.emissions.add(1, &attributes[..3]);
    }
}

/// Chain ids are recorded as text, since attribute integers are signed.
fn attributes(record: &EmissionRecord) -> [KeyValue; 4] {
    [
        KeyValue::new("sender", record.sender.to_string()),
        KeyValue::new("version", record.version.clone()),
        KeyValue::new("chain_id", record.chain_id.to_string()),
        KeyValue::new("node_info", record.node_info.clone()),
    ]
}
