use std::collections::HashMap;

use crate::engine::NodeId;

/// Cancellation bookkeeping for timer expiry events.
///
/// Expiries sit in the engine's event queue stamped with the generation of
/// their timer at start time. Cancelling bumps the generation, so an expiry
/// that was already queued is recognised as stale when popped and its
/// callback is never invoked.
#[derive(Debug, Default)]
pub struct TimerTable {
    /// Key: (node, timer_id), Value: generation counter
    generations: HashMap<(NodeId, u32), u64>,
    /// Timers with a queued, not yet cancelled, expiry.
    armed: HashMap<(NodeId, u32), u64>,
}

impl TimerTable {
    /// Arm a timer; returns the generation the expiry event must carry.
    pub fn arm(&mut self, node: NodeId, timer_id: u32) -> u64 {
        let key = (node, timer_id);
        let generation = *self.generations.entry(key).or_insert(0);
        self.armed.insert(key, generation);
        generation
    }

    /// Invalidate any queued expiry for this timer. Cancelling a timer that
    /// is not armed only advances the generation.
    pub fn cancel(&mut self, node: NodeId, timer_id: u32) {
        let key = (node, timer_id);
        *self.generations.entry(key).or_insert(0) += 1;
        self.armed.remove(&key);
    }

    /// Consume an expiry popped from the queue. Returns `true` if the
    /// callback should run.
    pub fn expire(&mut self, node: NodeId, timer_id: u32, generation: u64) -> bool {
        let key = (node, timer_id);
        match self.generations.get(&key) {
            Some(&current) if current == generation => {
                self.armed.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}
