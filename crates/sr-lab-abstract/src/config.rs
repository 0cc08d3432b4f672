use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::seq::SeqSpace;

/// Channel and application-layer parameters of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    /// Delay before the sending application re-offers data the sender refused.
    pub app_retry_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 4,
            seed: 0,
            app_retry_ms: 1,
        }
    }
}

/// Selective-Repeat parameters shared by both endpoints. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrConfig {
    /// K: sequence numbers range over `0..modulus`
    pub modulus: u32,
    /// Ns
    pub sender_window: u32,
    /// Nr
    pub receiver_window: u32,
    pub timeout_ms: u64,
    /// Sequence number of the first data packet; both window bases start here.
    pub initial_seq: u32,
    /// Nominal frame lengths (bits), reported in traces.
    pub data_frame_len: u32,
    pub ack_frame_len: u32,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            modulus: 16,
            sender_window: 5,
            receiver_window: 6,
            timeout_ms: 10,
            initial_seq: 1,
            data_frame_len: 10,
            ack_frame_len: 10,
        }
    }
}

impl SrConfig {
    /// Check the invariants Selective Repeat needs to tell a new packet from
    /// a retransmission: both windows non-empty, `Ns + Nr <= K` and
    /// `Ns <= Nr`. The last one keeps every packet the sender can have in
    /// flight inside the receive window, so nothing is ACKed unstored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modulus < 2 {
            return Err(ConfigError::ModulusTooSmall(self.modulus));
        }
        if self.sender_window == 0 {
            return Err(ConfigError::EmptyWindow("sender"));
        }
        if self.receiver_window == 0 {
            return Err(ConfigError::EmptyWindow("receiver"));
        }
        let combined = self.sender_window as u64 + self.receiver_window as u64;
        if combined > self.modulus as u64 {
            return Err(ConfigError::WindowsExceedSequenceSpace {
                sender: self.sender_window,
                receiver: self.receiver_window,
                modulus: self.modulus,
            });
        }
        if self.sender_window > self.receiver_window {
            return Err(ConfigError::SenderWindowExceedsReceiver {
                sender: self.sender_window,
                receiver: self.receiver_window,
            });
        }
        if self.initial_seq >= self.modulus {
            return Err(ConfigError::InitialSeqOutOfRange {
                initial_seq: self.initial_seq,
                modulus: self.modulus,
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn seq_space(&self) -> SeqSpace {
        SeqSpace::new(self.modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(modulus: u32, sender_window: u32, receiver_window: u32) -> SrConfig {
        SrConfig {
            modulus,
            sender_window,
            receiver_window,
            ..Default::default()
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(SrConfig::default().validate().is_ok());
    }

    #[test]
    fn windows_may_fill_sequence_space_exactly() {
        assert!(config(8, 4, 4).validate().is_ok());
    }

    #[test]
    fn rejects_overlapping_windows() {
        assert!(matches!(
            config(8, 5, 4).validate(),
            Err(ConfigError::WindowsExceedSequenceSpace {
                sender: 5,
                receiver: 4,
                modulus: 8
            })
        ));
    }

    #[test]
    fn rejects_sender_window_wider_than_receiver() {
        // Fits K, but the sender could run ahead of what the receiver stores.
        assert!(matches!(
            config(8, 6, 2).validate(),
            Err(ConfigError::SenderWindowExceedsReceiver {
                sender: 6,
                receiver: 2
            })
        ));
        assert!(config(8, 2, 6).validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_values() {
        assert!(matches!(
            config(1, 1, 1).validate(),
            Err(ConfigError::ModulusTooSmall(1))
        ));
        assert!(matches!(
            config(8, 0, 4).validate(),
            Err(ConfigError::EmptyWindow("sender"))
        ));
        let mut bad_seq = config(8, 2, 2);
        bad_seq.initial_seq = 8;
        assert!(matches!(
            bad_seq.validate(),
            Err(ConfigError::InitialSeqOutOfRange { .. })
        ));
        let mut no_timeout = config(8, 2, 2);
        no_timeout.timeout_ms = 0;
        assert!(matches!(no_timeout.validate(), Err(ConfigError::ZeroTimeout)));
    }
}
