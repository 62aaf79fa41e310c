//! Counters and snapshots describing reassembly state

use serde::Serialize;

/// Snapshot of the per-PID buffers and the consumer registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReassemblyStats {
    pub total_buffers: usize,
    pub total_consumers: usize,
    pub active_pids: Vec<u16>,
}

/// Running counters for one decoding session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamCounters {
    pub packets: u64,
    /// wrong size or sync byte
    pub framing_drops: u64,
    pub scrambled_drops: u64,
    pub sections_dispatched: u64,
    pub crc_errors: u64,
    pub overflow_resets: u64,
    pub consumer_errors: u64,
    /// AIT sections that produced a result
    pub ait_sections_decoded: u64,
}

impl StreamCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
