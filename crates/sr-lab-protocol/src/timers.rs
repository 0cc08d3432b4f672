use std::collections::BTreeSet;

use sr_lab_abstract::{ProtocolError, ProtocolResult, SystemContext};

/// Per-sequence-number retransmission timers.
///
/// The actual countdown lives in the simulator; this keeps the sender's view
/// of which timers are armed and enforces the start/stop preconditions.
/// A timer's registration ends when it fires, so stopping it afterwards is
/// misuse just like a double stop.
#[derive(Debug)]
pub struct RetransmitTimers {
    timeout_ms: u64,
    running: BTreeSet<u32>,
}

impl RetransmitTimers {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            running: BTreeSet::new(),
        }
    }

    pub fn start(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> ProtocolResult<()> {
        if !self.running.insert(seq) {
            return Err(ProtocolError::TimerAlreadyRunning(seq));
        }
        ctx.start_timer(self.timeout_ms, seq);
        ctx.log(&format!(
            "TIMER STARTED for a timeout of {} for packet {}",
            self.timeout_ms, seq
        ));
        Ok(())
    }

    pub fn stop(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> ProtocolResult<()> {
        if !self.running.remove(&seq) {
            return Err(ProtocolError::TimerNotRunning(seq));
        }
        ctx.cancel_timer(seq);
        ctx.log(&format!("TIMER STOPPED for packet {}", seq));
        Ok(())
    }

    pub fn restart(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> ProtocolResult<()> {
        self.stop(ctx, seq)?;
        self.start(ctx, seq)
    }

    /// Record a natural expiry. Returns `false` if `seq` had no armed timer,
    /// i.e. the expiry is stale and must not be acted on.
    pub fn fired(&mut self, seq: u32) -> bool {
        self.running.remove(&seq)
    }

    pub fn is_running(&self, seq: u32) -> bool {
        self.running.contains(&seq)
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
