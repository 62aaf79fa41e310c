//! JSON report for one inspection run

use serde::Serialize;

use crate::processor::PacketProcessor;
use crate::stats::{ReassemblyStats, StreamCounters};
use crate::types::AitEvent;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub ait: AitEvent,
    pub pmt_pids: Vec<u16>,
    pub ait_pids: Vec<u16>,
    pub counters: StreamCounters,
    pub reassembly: ReassemblyStats,
}

pub struct Reporter;

impl Reporter {
    /// Snapshot of the processor. Without a decoded AIT the outcome is
    /// `NoneDetected`.
    pub fn create_report(processor: &PacketProcessor, source: Option<&str>) -> Report {
        Report {
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: source.map(str::to_string),
            ait: processor.last_event().cloned().unwrap_or(AitEvent::NoneDetected),
            pmt_pids: processor.pmt_pids(),
            ait_pids: processor.ait_pids(),
            counters: processor.counters().clone(),
            reassembly: processor.stats(),
        }
    }

    /// Pretty-printed JSON for CLI output
    pub fn generate_json_report(processor: &PacketProcessor, source: Option<&str>) -> String {
        let rep = Self::create_report(processor, source);
        serde_json::to_string_pretty(&rep)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}
