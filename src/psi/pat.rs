use crate::constants::TABLE_ID_PAT;
use crate::error::{Error, Result};
use crate::psi::section::SectionReader;

/// transport_stream_id, version/current_next and section numbers, skipped
/// before program_loop_length
const PAT_FIXED_HEADER: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatSection {
    pub transport_stream_id: u16,
    pub version: u8,
    pub current_next: bool,
    pub programs: Vec<PatEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Parses a raw PAT section, CRC included.
pub fn parse_pat(payload: &[u8]) -> Result<PatSection> {
    let sec = SectionReader::new(payload)?;
    pat_from_section(&sec)
}

/// Program loop of an already validated section. The network PID entry
/// (program_number 0) is left out.
pub fn pat_from_section(sec: &SectionReader<'_>) -> Result<PatSection> {
    if sec.table_id() != TABLE_ID_PAT {
        return Err(Error::TableId {
            expected: TABLE_ID_PAT,
            found: sec.table_id(),
        });
    }
    let body = sec.body();
    let syntax = sec.syntax_header().ok_or(Error::Truncated {
        what: "PAT header",
        needed: PAT_FIXED_HEADER,
        available: body.len(),
    })?;

    let rest = &body[PAT_FIXED_HEADER..];
    if rest.len() < 2 {
        return Err(Error::Truncated {
            what: "PAT program_loop_length",
            needed: 2,
            available: rest.len(),
        });
    }
    let loop_len = (((rest[0] & 0x0F) as usize) << 8) | rest[1] as usize;
    let entries = &rest[2..];
    if loop_len > entries.len() {
        log::debug!(
            "PAT program loop claims {loop_len} bytes, {} before the CRC",
            entries.len()
        );
    }

    let programs = entries[..loop_len.min(entries.len())]
        .chunks_exact(4)
        .filter_map(|e| {
            let program_number = u16::from_be_bytes([e[0], e[1]]);
            let pmt_pid = (((e[2] & 0x1F) as u16) << 8) | e[3] as u16;
            (program_number != 0).then_some(PatEntry { program_number, pmt_pid })
        })
        .collect();

    Ok(PatSection {
        transport_stream_id: syntax.table_id_extension,
        version: syntax.version,
        current_next: syntax.current_next,
        programs,
    })
}
