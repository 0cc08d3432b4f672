//! Error types shared by protocol implementations and the simulator.

use thiserror::Error;

/// A rejected `SrConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sequence modulus must be at least 2, got {0}")]
    ModulusTooSmall(u32),

    #[error("{0} window must hold at least one sequence number")]
    EmptyWindow(&'static str),

    /// Ns + Nr > K: the receiver could mistake a retransmission for new data.
    #[error(
        "sender window {sender} + receiver window {receiver} exceeds sequence space {modulus}"
    )]
    WindowsExceedSequenceSpace {
        sender: u32,
        receiver: u32,
        modulus: u32,
    },

    /// Ns > Nr: the receiver would ACK packets ahead of its window without
    /// storing them, and the sender would never resend them.
    #[error("sender window {sender} exceeds receiver window {receiver}")]
    SenderWindowExceedsReceiver { sender: u32, receiver: u32 },

    #[error("initial sequence number {initial_seq} is outside 0..{modulus}")]
    InitialSeqOutOfRange { initial_seq: u32, modulus: u32 },

    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,
}

/// A broken contract inside a protocol endpoint.
///
/// These never describe channel misbehaviour (loss and corruption are
/// absorbed by retransmission); they mean the endpoint's own bookkeeping is
/// inconsistent, and the simulator stops the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("timer for seq {0} started while already running")]
    TimerAlreadyRunning(u32),

    #[error("timer for seq {0} stopped while not running")]
    TimerNotRunning(u32),

    #[error("no buffered packet for seq {0}")]
    MissingSlot(u32),
}

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
