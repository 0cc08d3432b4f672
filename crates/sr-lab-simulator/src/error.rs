use sr_lab_abstract::{ConfigError, ProtocolError};
use thiserror::Error;

use crate::engine::NodeId;

#[derive(Debug, Error)]
pub enum SimError {
    /// An endpoint reported broken bookkeeping; the run cannot continue.
    #[error("{node:?} protocol failure at t={time}: {source}")]
    Protocol {
        node: NodeId,
        time: u64,
        #[source]
        source: ProtocolError,
    },

    #[error("invalid protocol configuration: {0}")]
    Config(#[from] ConfigError),
}
