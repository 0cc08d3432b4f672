use bytes::Bytes;

use crate::error::ProtocolResult;
use crate::packet::Packet;

/// The capability provided by the simulator to a protocol endpoint.
/// Endpoints call these methods to interact with the network and application layer.
pub trait SystemContext {
    /// Send a packet to the network (unreliable channel). Fire-and-forget.
    fn send_packet(&mut self, packet: Packet);

    /// Start a timer.
    /// `timer_id` identifies this timer (the Selective-Repeat sender uses the sequence number).
    /// `delay_ms` is the duration in logical milliseconds.
    /// Starting an id that is already armed schedules a second expiry; callers
    /// are expected to cancel first.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Cancel a running timer. A cancelled timer never reaches `on_timer`.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver data to the Application Layer.
    fn deliver_data(&mut self, data: &Bytes);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Get current simulation time in ms
    fn now(&self) -> u64;

    /// Record a numeric metric for the trace report (e.g. window base).
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so non-recording environments don't need to care.
    }
}

/// One endpoint of a transfer. An `Err` from any callback is a contract
/// violation inside the endpoint and halts the simulation.
pub trait TransportProtocol {
    /// Called when the simulation starts.
    fn init(&mut self, _ctx: &mut dyn SystemContext) -> ProtocolResult<()> {
        Ok(())
    }

    /// Called when a packet arrives from the network.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) -> ProtocolResult<()>;

    /// Called when a timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) -> ProtocolResult<()>;

    /// Called when the Application Layer wants to send data reliably.
    /// Returns `Ok(false)` when the data is refused and must be offered again later.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: Bytes) -> ProtocolResult<bool>;
}
