// processor/mapping.rs
//! PAT → PMT → AIT consumer chain.
//!
//! The PAT consumer registers one PMT consumer per announced PMT PID; each
//! PMT consumer registers an AIT consumer for every elementary stream whose
//! stream_type marks it as an AIT candidate.

use anyhow::Context;
use log::{debug, info};

use crate::ait::AitDecoder;
use crate::constants::{TABLE_ID_AIT, TABLE_ID_PMT};
use crate::psi::reassembler::{SectionConsumer, SectionContext};
use crate::psi::section::SectionReader;
use crate::psi::{pat_from_section, pmt_from_section};

pub struct PatConsumer {
    ait_stream_types: Vec<u8>,
    version: Option<u8>,
}

impl PatConsumer {
    pub fn new(ait_stream_types: Vec<u8>) -> Self {
        Self { ait_stream_types, version: None }
    }
}

impl SectionConsumer for PatConsumer {
    fn name(&self) -> &'static str {
        "pat"
    }

    fn on_section(&mut self, pid: u16, section: &SectionReader<'_>, ctx: &mut SectionContext) -> anyhow::Result<()> {
        let pat = pat_from_section(section).with_context(|| format!("PAT on PID 0x{pid:04X}"))?;
        if self.version != Some(pat.version) {
            info!(
                "PAT v{} (tsid 0x{:04X}): {} program(s)",
                pat.version,
                pat.transport_stream_id,
                pat.programs.len()
            );
            self.version = Some(pat.version);
        }
        for prog in &pat.programs {
            ctx.register(
                TABLE_ID_PMT,
                Box::new(PmtConsumer::new(prog.program_number, prog.pmt_pid, self.ait_stream_types.clone())),
            );
        }
        Ok(())
    }
}

/// Bound to one PMT PID.
pub struct PmtConsumer {
    program_number: u16,
    pid: u16,
    ait_stream_types: Vec<u8>,
}

impl PmtConsumer {
    pub fn new(program_number: u16, pid: u16, ait_stream_types: Vec<u8>) -> Self {
        Self { program_number, pid, ait_stream_types }
    }
}

impl SectionConsumer for PmtConsumer {
    fn name(&self) -> &'static str {
        "pmt"
    }

    fn pid(&self) -> Option<u16> {
        Some(self.pid)
    }

    fn on_section(&mut self, pid: u16, section: &SectionReader<'_>, ctx: &mut SectionContext) -> anyhow::Result<()> {
        let pmt = pmt_from_section(section)
            .with_context(|| format!("PMT for program {} on PID 0x{pid:04X}", self.program_number))?;
        for es in pmt.streams.iter().filter(|s| self.ait_stream_types.contains(&s.stream_type)) {
            debug!(
                "program {}: PID 0x{:04X} (stream_type 0x{:02X}) is an AIT candidate",
                pmt.program_number, es.elementary_pid, es.stream_type
            );
            ctx.register(TABLE_ID_AIT, Box::new(AitConsumer::scoped(es.elementary_pid)));
        }
        Ok(())
    }
}

/// Feeds table_id 0x74 sections to an [`AitDecoder`] and emits its results.
pub struct AitConsumer {
    pid: Option<u16>,
    decoder: AitDecoder,
}

impl AitConsumer {
    pub fn scoped(pid: u16) -> Self {
        Self { pid: Some(pid), decoder: AitDecoder::new() }
    }

    pub fn any_pid() -> Self {
        Self { pid: None, decoder: AitDecoder::new() }
    }
}

impl SectionConsumer for AitConsumer {
    fn name(&self) -> &'static str {
        "ait"
    }

    fn pid(&self) -> Option<u16> {
        self.pid
    }

    fn on_section(&mut self, _pid: u16, section: &SectionReader<'_>, ctx: &mut SectionContext) -> anyhow::Result<()> {
        if let Some(event) = self.decoder.on_section(section.table_id(), section.raw) {
            ctx.emit(event);
        }
        Ok(())
    }
}
