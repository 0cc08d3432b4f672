use std::collections::HashMap;

use bytes::Bytes;
use sr_lab_abstract::{
    ConfigError, Packet, ProtocolResult, SeqSpace, SeqWindow, SrConfig, SystemContext,
    TransportProtocol,
};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub acks_sent: u64,
    /// ACKs for packets received before: already delivered (outside the
    /// receive window) or already buffered inside it.
    pub reacks: u64,
    pub delivered: u64,
    pub corrupted_dropped: u64,
}

/// Selective-Repeat receiver.
#[derive(Debug)]
pub struct SrReceiver {
    config: SrConfig,
    space: SeqSpace,
    rcv_base: u32,
    buffer: HashMap<u32, Packet>,
    last_ack: Option<Packet>,
    stats: ReceiverStats,
}

impl SrReceiver {
    pub fn new(config: SrConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            space: config.seq_space(),
            rcv_base: config.initial_seq,
            buffer: HashMap::new(),
            last_ack: None,
            stats: ReceiverStats::default(),
            config,
        })
    }

    pub fn rcv_base(&self) -> u32 {
        self.rcv_base
    }

    pub fn window(&self) -> SeqWindow {
        self.space.window(self.rcv_base, self.config.receiver_window)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_ack(&self) -> Option<&Packet> {
        self.last_ack.as_ref()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    fn send_ack(&mut self, ctx: &mut dyn SystemContext, seq: u32) {
        let ack = Packet::ack(seq, self.config.ack_frame_len);
        ctx.log(&format!("Got packet {}. Sent ACK", seq));
        ctx.send_packet(ack.clone());
        self.last_ack = Some(ack);
        self.stats.acks_sent += 1;
    }

    /// Hand the contiguous run starting at `rcv_base` to the application.
    fn deliver_in_order(&mut self, ctx: &mut dyn SystemContext) {
        while let Some(packet) = self.buffer.remove(&self.rcv_base) {
            ctx.deliver_data(&packet.payload);
            ctx.log(&format!(
                "Delivered data: {} to RECEIVING APPLICATION",
                self.rcv_base
            ));
            self.stats.delivered += 1;
            self.rcv_base = self.space.next(self.rcv_base);
        }
        ctx.log(&format!(
            "Current Receiver window: {:?} base = {}",
            self.window().iter().collect::<Vec<_>>(),
            self.rcv_base
        ));
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) -> ProtocolResult<()> {
        ctx.log(&format!(
            "SR receiver ready: K={} N={}",
            self.config.modulus, self.config.receiver_window
        ));
        Ok(())
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) -> ProtocolResult<()> {
        if packet.is_corrupted() {
            self.stats.corrupted_dropped += 1;
            ctx.log("got corrupted packet");
            return Ok(());
        }
        if !packet.header.is_data() {
            debug!(seq = packet.seq(), "receiver ignoring non-data packet");
            return Ok(());
        }

        let seq = packet.seq();
        self.send_ack(ctx, seq);

        if !self.window().contains(seq) || self.buffer.contains_key(&seq) {
            self.stats.reacks += 1;
            return Ok(());
        }

        self.buffer.insert(seq, packet);
        if seq == self.rcv_base {
            self.deliver_in_order(ctx);
        }
        ctx.record_metric("receiver.base", self.rcv_base as f64);
        ctx.record_metric("receiver.buffered", self.buffer.len() as f64);
        Ok(())
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext, _timer_id: u32) -> ProtocolResult<()> {
        // Receiver has no timers
        Ok(())
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, _data: Bytes) -> ProtocolResult<bool> {
        ctx.log("SR receiver does not send application data");
        Ok(false)
    }
}
