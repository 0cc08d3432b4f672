use crate::error::SimError;
use crate::timer::TimerTable;
use crate::trace::SimulationReport;
use bytes::Bytes;
use rand::Rng;
use serde::Serialize;
use sr_lab_abstract::{Packet, SimConfig, SrConfig};
use sr_lab_abstract::{ProtocolResult, SystemContext, TransportProtocol};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival {
        to: NodeId,
        packet: Packet,
    },
    TimerExpiry {
        node: NodeId,
        timer_id: u32,
        generation: u64,
    },
    AppSend {
        data: Bytes,
    },
    /// Re-offer the application backlog after a refusal.
    AppRetry,
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Scheduling order; breaks ties between events at the same time (FIFO)
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events for the trace.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug)]
enum TimerOp {
    Start { delay: u64, id: u32 },
    Cancel { id: u32 },
}

/// Actions buffered during an endpoint callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    // Kept in call order so that cancel-then-start and start-then-cancel both behave
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<Bytes>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the endpoints
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.buffer.timer_ops.push(TimerOp::Start {
            delay: delay_ms,
            id: timer_id,
        });
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.buffer.timer_ops.push(TimerOp::Cancel { id: timer_id });
    }

    fn deliver_data(&mut self, data: &Bytes) {
        self.buffer.delivered_data.push(data.clone());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// Discrete-event simulation of a sender and a receiver joined by a lossy,
/// corrupting, delaying channel.
///
/// Single-threaded: events are popped in time order, ties broken by the order
/// they were scheduled, and every endpoint callback runs to completion before
/// its buffered actions are applied.
pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    protocol_config: Option<SrConfig>,
    rng: rand::rngs::StdRng,

    // We hold the two nodes directly
    // We use Box to allow different implementations
    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    // Stats for the scenario runner
    pub delivered_data: Vec<Bytes>,
    pub sender_packet_count: u32,
    /// Times the sender refused application data (window full)
    pub app_refusals: u32,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "sender.base"), Value: Vec<(time_ms, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection: drop first packet from Sender with given seq numbers
    drop_sender_seq_once: Vec<u32>,
    // Deterministic fault injection: drop first ACK from Receiver for given seq numbers
    drop_receiver_ack_once: Vec<u32>,
    // Deterministic fault injection: corrupt first packet from Sender with given seq numbers
    corrupt_sender_seq_once: Vec<u32>,

    /// Application data not yet accepted by the sender, oldest first
    app_backlog: VecDeque<Bytes>,
    app_retry_pending: bool,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: TimerTable,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            protocol_config: None,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            app_refusals: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            app_backlog: VecDeque::new(),
            app_retry_pending: false,
            link_events: Vec::new(),
            timers: TimerTable::default(),
        }
    }

    /// A simulator wired to a Selective-Repeat sender/receiver pair.
    pub fn selective_repeat(config: SimConfig, protocol: SrConfig) -> Result<Self, SimError> {
        let (sender, receiver) = sr_lab_protocol::pair(&protocol)?;
        let mut sim = Self::new(config, sender, receiver);
        sim.protocol_config = Some(protocol);
        Ok(sim)
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver for `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    /// Return a slice of (time_ms, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Most recent sample of a named metric.
    pub fn last_metric(&self, name: &str) -> Option<f64> {
        self.metric_series(name)
            .and_then(|series| series.last())
            .map(|(_, value)| *value)
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: impl Into<Bytes>) {
        self.push_event(time, EventType::AppSend { data: data.into() });
    }

    pub fn init(&mut self) -> Result<(), SimError> {
        self.dispatch(NodeId::Sender, |node, ctx| node.init(ctx))?;
        self.dispatch(NodeId::Receiver, |node, ctx| node.init(ctx))?;
        Ok(())
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Application data waiting for window space.
    pub fn app_backlog_len(&self) -> usize {
        self.app_backlog.len()
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }

    /// Process the next event. Returns `Ok(true)` if an event was processed,
    /// `Ok(false)` if the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                self.dispatch(to, |node, ctx| node.on_packet(ctx, packet))?;
            }
            EventType::TimerExpiry {
                node,
                timer_id,
                generation,
            } => {
                if !self.timers.expire(node, timer_id, generation) {
                    debug!("Skipping cancelled timer event for timer_id={}", timer_id);
                    return Ok(true); // Event processed (by being ignored)
                }
                self.dispatch(node, |n, ctx| n.on_timer(ctx, timer_id))?;
            }
            EventType::AppSend { data } => {
                self.app_backlog.push_back(data);
                self.offer_backlog()?;
            }
            EventType::AppRetry => {
                self.app_retry_pending = false;
                self.offer_backlog()?;
            }
        }
        Ok(true)
    }

    /// Hand queued application data to the sender in order until it refuses.
    fn offer_backlog(&mut self) -> Result<(), SimError> {
        while let Some(data) = self.app_backlog.front().cloned() {
            let accepted = self.dispatch(NodeId::Sender, |node, ctx| node.on_app_data(ctx, data))?;
            if accepted {
                self.app_backlog.pop_front();
                continue;
            }
            self.app_refusals += 1;
            if !self.app_retry_pending {
                self.app_retry_pending = true;
                // A zero delay would spin at one instant and starve the ACKs.
                let retry_at = self.time + self.config.app_retry_ms.max(1);
                self.push_event(retry_at, EventType::AppRetry);
            }
            break;
        }
        Ok(())
    }

    /// Run one endpoint callback against a fresh action buffer, then apply its actions.
    fn dispatch<T>(
        &mut self,
        node: NodeId,
        callback: impl FnOnce(&mut dyn TransportProtocol, &mut dyn SystemContext) -> ProtocolResult<T>,
    ) -> Result<T, SimError> {
        let mut buffer = ActionBuffer::default();
        let result = {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            let endpoint = match node {
                NodeId::Sender => self.sender.as_mut(),
                NodeId::Receiver => self.receiver.as_mut(),
            };
            callback(endpoint, &mut ctx)
        };
        self.process_actions(node, buffer);
        result.map_err(|source| SimError::Protocol {
            node,
            time: self.time,
            source,
        })
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            protocol: self.protocol_config.clone(),
            duration_ms: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            app_refusals: self.app_refusals,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) -> Result<(), SimError> {
        self.init()?;
        while self.step()? {}
        Ok(())
    }

    /// Like [`Simulator::run_until_complete`], but stops before processing any
    /// event later than `limit_ms`. Returns `true` if the queue drained.
    pub fn run_until(&mut self, limit_ms: u64) -> Result<bool, SimError> {
        self.init()?;
        while let Some(next) = self.peek_next_event_time() {
            if next > limit_ms {
                return Ok(false);
            }
            self.step()?;
        }
        Ok(true)
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("TIME: {} [{:?}] {}", self.time, source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {} bytes to application",
                    source_node,
                    data.len()
                ),
            });
            self.delivered_data.push(data);
        }

        for op in buffer.timer_ops {
            match op {
                TimerOp::Cancel { id } => self.timers.cancel(source_node, id),
                TimerOp::Start { delay, id } => {
                    let generation = self.timers.arm(source_node, id);
                    self.push_event(
                        self.time + delay,
                        EventType::TimerExpiry {
                            node: source_node,
                            timer_id: id,
                            generation,
                        },
                    );
                }
            }
        }

        // Packet transmission logic (Channel)
        for packet in buffer.outgoing_packets {
            self.transmit(source_node, packet);
        }
    }

    fn transmit(&mut self, source_node: NodeId, mut packet: Packet) {
        let target_node = source_node.peer();
        let seq = packet.seq();

        if source_node == NodeId::Sender {
            self.sender_packet_count += 1;

            // Deterministic SR tests: optionally drop first packet with given seq
            if take_once(&mut self.drop_sender_seq_once, seq) {
                self.link_event(format!(
                    "[Sender->Receiver] DROP (deterministic seq) seq={}",
                    seq
                ));
                debug!("Deterministically dropping sender packet with seq={}", seq);
                return;
            }
            if take_once(&mut self.corrupt_sender_seq_once, seq) {
                self.link_event(format!(
                    "[Sender->Receiver] CORRUPT (deterministic seq) seq={}",
                    seq
                ));
                debug!("Deterministically corrupting sender packet with seq={}", seq);
                packet.corrupt();
            }
        }

        // Deterministic tests: optionally drop first ACK for a given seq
        if source_node == NodeId::Receiver
            && packet.header.is_ack()
            && take_once(&mut self.drop_receiver_ack_once, seq)
        {
            self.link_event(format!(
                "[Receiver->Sender] DROP (deterministic ack) ack={}",
                seq
            ));
            debug!("Deterministically dropping receiver ACK with ack={}", seq);
            return;
        }

        // 1. Check Loss
        if self.rng.random::<f64>() < self.config.loss_rate {
            self.link_event(format!(
                "[{:?}->{:?}] DROP (random loss) seq={}",
                source_node, target_node, seq
            ));
            debug!("Packet lost in channel");
            return;
        }

        // 2. Check Corruption
        if self.rng.random::<f64>() < self.config.corrupt_rate {
            self.link_event(format!(
                "[{:?}->{:?}] CORRUPT seq={}",
                source_node, target_node, seq
            ));
            debug!("Packet corrupted in channel");
            packet.corrupt();
        }

        // 3. Calculate Latency
        let latency = if self.config.max_latency > self.config.min_latency {
            self.rng
                .random_range(self.config.min_latency..=self.config.max_latency)
        } else {
            self.config.min_latency
        };
        let arrival_time = self.time + latency;

        self.link_event(format!(
            "[{:?}->{:?}] SEND seq={} len={} (latency={}ms)",
            source_node, target_node, seq, packet.header.frame_len, latency
        ));

        self.push_event(
            arrival_time,
            EventType::PacketArrival {
                to: target_node,
                packet,
            },
        );
    }

    fn link_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }
}

/// Remove one occurrence of `seq` from a one-shot fault list.
fn take_once(faults: &mut Vec<u32>, seq: u32) -> bool {
    match faults.iter().position(|s| *s == seq) {
        Some(pos) => {
            faults.remove(pos);
            true
        }
        None => false,
    }
}
