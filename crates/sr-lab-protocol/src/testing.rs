use bytes::Bytes;
use sr_lab_abstract::{Packet, SystemContext};

/// A `SystemContext` that records every request instead of acting on it.
#[derive(Default)]
pub struct RecordingContext {
    pub now: u64,
    pub sent: Vec<Packet>,
    pub timers_started: Vec<(u64, u32)>,
    pub timers_cancelled: Vec<u32>,
    pub delivered: Vec<Bytes>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
}

impl RecordingContext {
    pub fn sent_seqs(&self) -> Vec<u32> {
        self.sent.iter().map(|p| p.seq()).collect()
    }

    pub fn delivered_strings(&self) -> Vec<String> {
        self.delivered
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
        self.timers_started.clear();
        self.timers_cancelled.clear();
        self.delivered.clear();
        self.logs.clear();
        self.metrics.clear();
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.timers_started.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.timers_cancelled.push(timer_id);
    }

    fn deliver_data(&mut self, data: &Bytes) {
        self.delivered.push(data.clone());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
