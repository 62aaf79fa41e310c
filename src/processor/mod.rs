//! Per-session packet processing: demux, reassembly and the PAT/PMT/AIT chain

mod mapping;

pub use mapping::{AitConsumer, PatConsumer, PmtConsumer};

use log::{debug, info};

use crate::ait::AitDecoder;
use crate::config::InspectorConfig;
use crate::constants::{TABLE_ID_AIT, TABLE_ID_PAT, TABLE_ID_PMT};
use crate::packet::TsPacketIter;
use crate::psi::Reassembler;
use crate::stats::{ReassemblyStats, StreamCounters};
use crate::types::AitEvent;

/// Owns all mutable decoding state for one stream. Tear it down, or call
/// [`PacketProcessor::reset`], when the stream changes.
pub struct PacketProcessor {
    config: InspectorConfig,
    reassembler: Reassembler,
    isolated: AitDecoder,
    last_event: Option<AitEvent>,
}

impl PacketProcessor {
    pub fn new(config: InspectorConfig) -> Self {
        let mut proc = Self {
            reassembler: Reassembler::new(config.max_section_size),
            config,
            isolated: AitDecoder::new(),
            last_event: None,
        };
        proc.register_roots();
        proc
    }

    fn register_roots(&mut self) {
        self.reassembler.register_consumer(
            TABLE_ID_PAT,
            Box::new(PatConsumer::new(self.config.ait_stream_types.clone())),
        );
        if self.config.ait_on_any_pid {
            self.reassembler
                .register_consumer(TABLE_ID_AIT, Box::new(AitConsumer::any_pid()));
        }
    }

    /// Process a single TS packet
    pub fn process_packet(&mut self, chunk: &[u8]) -> Vec<AitEvent> {
        let events = self.reassembler.process_packet(chunk);
        self.record(&events);
        events
    }

    /// Splits `data` into packets, resyncing on garbage, and processes each.
    /// A trailing partial packet is ignored.
    pub fn process_chunk(&mut self, data: &[u8]) -> Vec<AitEvent> {
        let mut iter = TsPacketIter::new(data);
        let mut events = Vec::new();
        for chunk in iter.by_ref() {
            events.extend(self.process_packet(chunk));
        }
        if iter.skipped() > 0 {
            debug!("skipped {} bytes while resyncing", iter.skipped());
        }
        if !iter.remainder().is_empty() {
            debug!("ignoring {} trailing bytes", iter.remainder().len());
        }
        events
    }

    /// Decodes a caller-isolated section positioned at its table_id byte,
    /// bypassing packet reassembly.
    pub fn feed_section(&mut self, raw: &[u8]) -> Option<AitEvent> {
        let event = self.isolated.feed_isolated_section(raw)?;
        self.record(std::slice::from_ref(&event));
        Some(event)
    }

    fn record(&mut self, events: &[AitEvent]) {
        let Some(last) = events.last() else {
            return;
        };
        self.reassembler.counters_mut().ait_sections_decoded += events.len() as u64;
        self.last_event = Some(last.clone());
    }

    /// Drops partial sections only; discovered PIDs stay registered.
    pub fn clear_buffers(&mut self) {
        self.reassembler.clear_buffers();
    }

    /// Back to the freshly constructed state: buffers, discovered consumers,
    /// counters and the last result are all dropped.
    pub fn reset(&mut self) {
        self.reassembler.clear_consumers();
        self.reassembler.counters_mut().reset();
        self.isolated = AitDecoder::new();
        self.last_event = None;
        self.register_roots();
        info!("processor reset");
    }

    /// PIDs announced in the PAT that carry PMTs.
    pub fn pmt_pids(&self) -> Vec<u16> {
        self.reassembler.scoped_pids(TABLE_ID_PMT)
    }

    /// PIDs the PMTs flagged as AIT candidates.
    pub fn ait_pids(&self) -> Vec<u16> {
        self.reassembler.scoped_pids(TABLE_ID_AIT)
    }

    pub fn last_event(&self) -> Option<&AitEvent> {
        self.last_event.as_ref()
    }

    pub fn counters(&self) -> &StreamCounters {
        self.reassembler.counters()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.reassembler.stats()
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }
}

impl Default for PacketProcessor {
    fn default() -> Self {
        Self::new(InspectorConfig::default())
    }
}
