use crate::config::{SimConfig, SrConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: SrConfigOverride,
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
    pub app_retry_ms: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.app_retry_ms {
            config.app_retry_ms = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SrConfigOverride {
    pub modulus: Option<u32>,
    pub sender_window: Option<u32>,
    pub receiver_window: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub initial_seq: Option<u32>,
    pub data_frame_len: Option<u32>,
    pub ack_frame_len: Option<u32>,
}

impl SrConfigOverride {
    pub fn apply_to(&self, config: &mut SrConfig) {
        if let Some(v) = self.modulus {
            config.modulus = v;
        }
        if let Some(v) = self.sender_window {
            config.sender_window = v;
        }
        if let Some(v) = self.receiver_window {
            config.receiver_window = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.initial_seq {
            config.initial_seq = v;
        }
        if let Some(v) = self.data_frame_len {
            config.data_frame_len = v;
        }
        if let Some(v) = self.ack_frame_len {
            config.ack_frame_len = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver for given seq number
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert the exact sequence of deliveries
    DeliveredInOrder { data: Vec<String> },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the sender's retransmission count is within range
    Retransmissions { min: u32, max: Option<u32> },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}
