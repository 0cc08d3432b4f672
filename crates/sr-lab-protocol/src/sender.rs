use std::collections::HashMap;

use bytes::Bytes;
use sr_lab_abstract::{
    ConfigError, Packet, ProtocolError, ProtocolResult, SeqSpace, SeqWindow, SrConfig,
    SystemContext, TransportProtocol,
};
use tracing::debug;

use crate::timers::RetransmitTimers;

/// State of a buffered packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Sent, timer armed, no ACK yet.
    InFlight,
    /// ACKed ahead of the base; retired once the base reaches it.
    Acknowledged,
}

#[derive(Debug)]
struct Slot {
    packet: Packet,
    state: SlotState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Data packets handed to the channel, retransmissions included.
    pub total_sent: u64,
    pub retransmissions: u64,
    /// Application sends refused because the window was full.
    pub refused: u64,
    /// ACKs for numbers not in flight, or already acknowledged.
    pub stale_acks: u64,
    pub corrupted_acks: u64,
}

/// Selective-Repeat sender.
///
/// Every packet in the window has its own timer; an ACK retires exactly the
/// packet it names, and the base slides over any run of acknowledged slots.
#[derive(Debug)]
pub struct SrSender {
    config: SrConfig,
    space: SeqSpace,
    base: u32,
    next_seq: u32,
    buffer: HashMap<u32, Slot>,
    timers: RetransmitTimers,
    stats: SenderStats,
}

impl SrSender {
    pub fn new(config: SrConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            space: config.seq_space(),
            base: config.initial_seq,
            next_seq: config.initial_seq,
            buffer: HashMap::new(),
            timers: RetransmitTimers::new(config.timeout_ms),
            stats: SenderStats::default(),
            config,
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn window(&self) -> SeqWindow {
        self.space.window(self.base, self.config.sender_window)
    }

    /// Number of buffered packets (in flight or acknowledged ahead of the base).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn slot_state(&self, seq: u32) -> Option<SlotState> {
        self.buffer.get(&seq).map(|slot| slot.state)
    }

    pub fn timers(&self) -> &RetransmitTimers {
        &self.timers
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    fn send(&mut self, ctx: &mut dyn SystemContext, payload: Bytes) -> ProtocolResult<bool> {
        if !self.window().contains(self.next_seq) {
            self.stats.refused += 1;
            ctx.log(&format!(
                "rdt_send() called for nextseqnum={} outside the current window. Refusing data.",
                self.next_seq
            ));
            return Ok(false);
        }

        let seq = self.next_seq;
        ctx.log(&format!(
            "rdt_send() called for nextseqnum={} within current window. Sending new packet.",
            seq
        ));
        let packet = Packet::data(seq, payload, self.config.data_frame_len);
        self.buffer.insert(
            seq,
            Slot {
                packet: packet.clone(),
                state: SlotState::InFlight,
            },
        );
        ctx.send_packet(packet);
        self.stats.total_sent += 1;
        self.timers.start(ctx, seq)?;
        self.next_seq = self.space.next(seq);
        Ok(true)
    }

    fn handle_ack(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> ProtocolResult<()> {
        let Some(slot) = self.buffer.get_mut(&seq) else {
            self.stats.stale_acks += 1;
            ctx.log(&format!(
                "Got an ACK {} for a packet not in the buffer. Ignoring it.",
                seq
            ));
            return Ok(());
        };

        match slot.state {
            SlotState::Acknowledged => {
                self.stats.stale_acks += 1;
                ctx.log(&format!("Duplicate ACK {}. Ignoring it.", seq));
                return Ok(());
            }
            SlotState::InFlight => {
                self.timers.stop(ctx, seq)?;
                slot.state = SlotState::Acknowledged;
            }
        }

        if seq == self.base {
            self.slide();
        }
        ctx.log(&format!(
            "Got an ACK {}. Updated window: {:?} base = {} nextseqnum = {}",
            seq,
            self.window().iter().collect::<Vec<_>>(),
            self.base,
            self.next_seq
        ));
        Ok(())
    }

    /// Retire the acknowledged run at the left edge of the window.
    fn slide(&mut self) {
        while self
            .buffer
            .get(&self.base)
            .is_some_and(|slot| slot.state == SlotState::Acknowledged)
        {
            self.buffer.remove(&self.base);
            self.base = self.space.next(self.base);
        }
    }

    fn retransmit(&mut self, ctx: &mut dyn SystemContext, seq: u32) -> ProtocolResult<()> {
        let packet = match self.buffer.get(&seq) {
            Some(slot) if slot.state == SlotState::InFlight => slot.packet.clone(),
            _ => return Err(ProtocolError::MissingSlot(seq)),
        };
        ctx.log(&format!(
            "TIMEOUT OCCURRED. Re-transmitting packet: {}",
            seq
        ));
        ctx.send_packet(packet);
        self.stats.retransmissions += 1;
        self.stats.total_sent += 1;
        self.timers.start(ctx, seq)
    }

    fn report(&self, ctx: &mut dyn SystemContext) {
        ctx.record_metric("sender.base", self.base as f64);
        ctx.record_metric("sender.in_flight", self.timers.len() as f64);
        ctx.record_metric("sender.retransmissions", self.stats.retransmissions as f64);
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) -> ProtocolResult<()> {
        ctx.log(&format!(
            "SR sender ready: K={} N={} timeout={}",
            self.config.modulus, self.config.sender_window, self.config.timeout_ms
        ));
        self.report(ctx);
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) -> ProtocolResult<()> {
        if packet.is_corrupted() {
            self.stats.corrupted_acks += 1;
            ctx.log(&format!("Got a corrupted ACK (seq field {}). Ignoring it.", packet.seq()));
            return Ok(());
        }
        if !packet.header.is_ack() {
            debug!(seq = packet.seq(), "sender ignoring non-ACK packet");
            return Ok(());
        }
        self.handle_ack(ctx, packet.seq())?;
        self.report(ctx);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) -> ProtocolResult<()> {
        if !self.timers.fired(timer_id) {
            debug!(seq = timer_id, "ignoring expiry of a timer that is not armed");
            return Ok(());
        }
        self.retransmit(ctx, timer_id)?;
        self.report(ctx);
        Ok(())
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: Bytes) -> ProtocolResult<bool> {
        let accepted = self.send(ctx, data)?;
        if accepted {
            self.report(ctx);
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn config(modulus: u32, window: u32) -> SrConfig {
        SrConfig {
            modulus,
            sender_window: window,
            receiver_window: window,
            timeout_ms: 10,
            initial_seq: 1,
            ..Default::default()
        }
    }

    fn ack(seq: u32) -> Packet {
        Packet::ack(seq, 10)
    }

    fn send_str(sender: &mut SrSender, ctx: &mut RecordingContext, data: &'static str) -> bool {
        sender
            .on_app_data(ctx, Bytes::from_static(data.as_bytes()))
            .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            SrSender::new(config(6, 4)),
            Err(ConfigError::WindowsExceedSequenceSpace { .. })
        ));
    }

    #[test]
    fn refuses_when_window_is_full() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();

        for payload in ["a", "b", "c", "d"] {
            assert!(send_str(&mut sender, &mut ctx, payload));
        }
        assert_eq!(ctx.sent_seqs(), vec![1, 2, 3, 4]);

        ctx.clear();
        assert!(!send_str(&mut sender, &mut ctx, "e"));
        assert!(ctx.sent.is_empty());
        assert!(ctx.timers_started.is_empty());
        assert_eq!(sender.next_seq(), 5);
        assert_eq!(sender.base(), 1);
        assert_eq!(sender.stats().refused, 1);
    }

    #[test]
    fn each_send_arms_its_own_timer() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        send_str(&mut sender, &mut ctx, "a");
        send_str(&mut sender, &mut ctx, "b");
        assert_eq!(ctx.timers_started, vec![(10, 1), (10, 2)]);
        assert!(sender.timers().is_running(1));
        assert!(sender.timers().is_running(2));
    }

    #[test]
    fn selective_ack_keeps_slot_until_base_reaches_it() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        send_str(&mut sender, &mut ctx, "a");
        send_str(&mut sender, &mut ctx, "b");

        sender.on_packet(&mut ctx, ack(2)).unwrap();
        assert_eq!(sender.base(), 1);
        assert_eq!(sender.slot_state(2), Some(SlotState::Acknowledged));
        assert!(!sender.timers().is_running(2));
        assert_eq!(ctx.timers_cancelled, vec![2]);

        sender.on_packet(&mut ctx, ack(1)).unwrap();
        assert_eq!(sender.base(), 3);
        assert_eq!(sender.buffered(), 0);
        assert_eq!(ctx.last_metric("sender.base"), Some(3.0));
    }

    #[test]
    fn slide_stops_at_first_unacknowledged_slot() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        for payload in ["a", "b", "c", "d"] {
            send_str(&mut sender, &mut ctx, payload);
        }
        sender.on_packet(&mut ctx, ack(2)).unwrap();
        sender.on_packet(&mut ctx, ack(4)).unwrap();
        sender.on_packet(&mut ctx, ack(1)).unwrap();

        assert_eq!(sender.base(), 3);
        assert_eq!(sender.slot_state(3), Some(SlotState::InFlight));
        assert_eq!(sender.slot_state(4), Some(SlotState::Acknowledged));
        assert!(send_str(&mut sender, &mut ctx, "e"));
        assert!(send_str(&mut sender, &mut ctx, "f"));
        assert!(!send_str(&mut sender, &mut ctx, "g"));
    }

    #[test]
    fn stale_duplicate_and_corrupted_acks_are_ignored() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        send_str(&mut sender, &mut ctx, "a");
        send_str(&mut sender, &mut ctx, "b");

        sender.on_packet(&mut ctx, ack(7)).unwrap();
        sender.on_packet(&mut ctx, ack(2)).unwrap();
        sender.on_packet(&mut ctx, ack(2)).unwrap();
        let mut damaged = ack(1);
        damaged.corrupt();
        sender.on_packet(&mut ctx, damaged).unwrap();

        assert_eq!(sender.base(), 1);
        assert_eq!(sender.stats().stale_acks, 2);
        assert_eq!(sender.stats().corrupted_acks, 1);
        assert_eq!(ctx.timers_cancelled, vec![2]);
        assert!(sender.timers().is_running(1));
    }

    #[test]
    fn timeout_retransmits_only_that_packet() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        send_str(&mut sender, &mut ctx, "a");
        send_str(&mut sender, &mut ctx, "b");
        ctx.clear();

        sender.on_timer(&mut ctx, 2).unwrap();
        assert_eq!(ctx.sent_seqs(), vec![2]);
        assert_eq!(ctx.sent[0].payload, Bytes::from_static(b"b"));
        assert_eq!(ctx.timers_started, vec![(10, 2)]);
        assert_eq!(sender.stats().retransmissions, 1);
        assert_eq!(sender.stats().total_sent, 3);
        assert_eq!(sender.base(), 1);
        assert_eq!(sender.next_seq(), 3);
    }

    #[test]
    fn expiry_of_unarmed_timer_is_ignored() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        send_str(&mut sender, &mut ctx, "a");
        sender.on_packet(&mut ctx, ack(1)).unwrap();
        ctx.clear();

        sender.on_timer(&mut ctx, 1).unwrap();
        assert!(ctx.sent.is_empty());
        assert_eq!(sender.stats().retransmissions, 0);
    }

    #[test]
    fn walkthrough_with_retransmission_and_cumulative_slide() {
        // K=10, Ns=Nr=4, timeout=10; A,B,C take seq 1,2,3.
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(10, 4)).unwrap();
        for payload in ["A", "B", "C"] {
            assert!(send_str(&mut sender, &mut ctx, payload));
        }

        ctx.now = 5;
        sender.on_packet(&mut ctx, ack(1)).unwrap();
        assert_eq!(sender.base(), 2);
        assert_eq!(sender.slot_state(1), None);
        assert!(!sender.timers().is_running(1));

        ctx.now = 10;
        sender.on_timer(&mut ctx, 2).unwrap();
        assert_eq!(sender.stats().retransmissions, 1);

        sender.on_timer(&mut ctx, 3).unwrap();
        sender.on_packet(&mut ctx, ack(3)).unwrap();
        assert_eq!(sender.base(), 2);
        sender.on_packet(&mut ctx, ack(2)).unwrap();
        assert_eq!(sender.base(), 4);
        assert_eq!(sender.next_seq(), 4);
        assert!(sender.timers().is_empty());
    }

    #[test]
    fn sequence_numbers_wrap_through_zero() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(config(4, 2)).unwrap();

        // K + 1 = 5 packets, each acknowledged right away.
        for _ in 0..5 {
            assert!(send_str(&mut sender, &mut ctx, "x"));
            let seq = ctx.sent.last().unwrap().seq();
            sender.on_packet(&mut ctx, ack(seq)).unwrap();
            assert_eq!(sender.base(), sender.next_seq());
        }
        assert_eq!(ctx.sent_seqs(), vec![1, 2, 3, 0, 1]);
        assert_eq!(sender.base(), 2);
    }

    #[test]
    fn window_full_across_wrap() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::new(SrConfig {
            initial_seq: 3,
            ..config(4, 2)
        })
        .unwrap();
        assert!(send_str(&mut sender, &mut ctx, "a"));
        assert!(send_str(&mut sender, &mut ctx, "b"));
        assert!(!send_str(&mut sender, &mut ctx, "c"));
        assert_eq!(ctx.sent_seqs(), vec![3, 0]);

        sender.on_packet(&mut ctx, ack(0)).unwrap();
        assert!(!send_str(&mut sender, &mut ctx, "c"));
        sender.on_packet(&mut ctx, ack(3)).unwrap();
        assert_eq!(sender.base(), 1);
        assert!(send_str(&mut sender, &mut ctx, "c"));
        assert_eq!(ctx.sent.last().unwrap().seq(), 1);
    }
}
