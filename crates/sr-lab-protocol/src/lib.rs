//! Selective-Repeat ARQ endpoints.
//!
//! [`SrSender`] keeps a window of unacknowledged packets, each with its own
//! retransmission timer. [`SrReceiver`] acknowledges every intact arrival,
//! buffers out-of-order packets inside its window and delivers in sequence.

pub mod receiver;
pub mod sender;
pub mod timers;

#[cfg(test)]
mod testing;

pub use receiver::{ReceiverStats, SrReceiver};
pub use sender::{SenderStats, SlotState, SrSender};
pub use timers::RetransmitTimers;

use sr_lab_abstract::{ConfigError, SrConfig, TransportProtocol};

pub fn sender(config: SrConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrSender::new(config)?))
}

pub fn receiver(config: SrConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrReceiver::new(config)?))
}

/// Build a sender/receiver pair sharing one configuration.
pub fn pair(
    config: &SrConfig,
) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>), ConfigError> {
    Ok((sender(config.clone())?, receiver(config.clone())?))
}
