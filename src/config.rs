use std::time::Duration;

use crate::constants::{
    AIT_TIMEOUT_MS, MAX_SECTION_SIZE, STREAM_TYPE_PRIVATE_PES, STREAM_TYPE_PRIVATE_SECTIONS,
};

/// Knobs for one decoding session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    /// Per-PID accumulator bound before a forced reset
    pub max_section_size: usize,
    /// Deadline for the "no AIT detected" signal
    pub ait_timeout: Duration,
    /// PMT stream types whose PIDs are treated as AIT candidates
    pub ait_stream_types: Vec<u8>,
    /// Accept table_id 0x74 from any PID, not only PMT-announced ones
    pub ait_on_any_pid: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_section_size: MAX_SECTION_SIZE,
            ait_timeout: Duration::from_millis(AIT_TIMEOUT_MS),
            ait_stream_types: vec![STREAM_TYPE_PRIVATE_SECTIONS, STREAM_TYPE_PRIVATE_PES],
            ait_on_any_pid: false,
        }
    }
}
