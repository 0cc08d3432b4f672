pub mod checksum;
pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod seq;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{Packet, SrHeader};
// Re-export flags module from packet so users can access SrHeader flags
pub use packet::flags;

pub use config::{SimConfig, SrConfig};
pub use error::{ConfigError, ProtocolError, ProtocolResult};
pub use scenario::{SimConfigOverride, SrConfigOverride, TestAction, TestAssertion, TestScenario};
pub use seq::{SeqSpace, SeqWindow};
