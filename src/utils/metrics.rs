use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use lazy_static::lazy_static;
use parking_lot::Mutex;

pub const BLOCKS_APPENDED: &str = "chain.appended";
pub const BLOCKS_REJECTED: &str = "chain.rejected";
pub const INBOUND_DROPPED: &str = "inbound.dropped";
pub const SIGNATURES_ISSUED: &str = "protocol.countersigned";
pub const SHARES_RECORDED: &str = "protocol.shares_recorded";
pub const CHAIN_HEIGHT: &str = "chain.height";

/// Metrics registry (simple, Prometheus-style)
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
    gauges: Arc<Mutex<BTreeMap<String, f64>>>,
}

/// Point-in-time copy of every counter and gauge.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str) {
        *self.counters.lock().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn set_gauge(&self, name: &str, val: f64) {
        self.gauges.lock().insert(name.to_string(), val);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.lock().clone(),
            gauges: self.gauges.lock().clone(),
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, val) in &self.counters {
            writeln!(f, "{:<28}{}", name, val)?;
        }
        for (name, val) in &self.gauges {
            writeln!(f, "{:<28}{}", name, val)?;
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}
