use bytes::Bytes;
use serde::Serialize;
use sr_lab_abstract::{SimConfig, SrConfig};
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    /// Present when the run was built with `Simulator::selective_repeat`.
    pub protocol: Option<SrConfig>,
    pub duration_ms: u64,
    pub delivered_data: Vec<Bytes>,
    pub sender_packet_count: u32,
    pub app_refusals: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Last recorded value of a metric.
    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)
            .and_then(|series| series.last())
            .map(|(_, value)| *value)
    }
}
