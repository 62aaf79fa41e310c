use crate::constants::TABLE_ID_PMT;
use crate::error::{Error, Result};
use crate::psi::section::SectionReader;

/// program_number, version/current_next, section numbers
const PMT_SYNTAX_HEADER: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtSection {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
}

pub fn parse_pmt(payload: &[u8]) -> Result<PmtSection> {
    let sec = SectionReader::new(payload)?;
    pmt_from_section(&sec)
}

pub fn pmt_from_section(sec: &SectionReader<'_>) -> Result<PmtSection> {
    if sec.table_id() != TABLE_ID_PMT {
        return Err(Error::TableId {
            expected: TABLE_ID_PMT,
            found: sec.table_id(),
        });
    }
    let body = sec.body();
    let syntax = sec.syntax_header().ok_or(Error::Truncated {
        what: "PMT header",
        needed: PMT_SYNTAX_HEADER,
        available: body.len(),
    })?;
    let b = &body[PMT_SYNTAX_HEADER..];
    if b.len() < 4 {
        return Err(Error::Truncated {
            what: "PMT PCR/program_info",
            needed: 4,
            available: b.len(),
        });
    }

    let pcr_pid = (((b[0] & 0x1F) as u16) << 8) | b[1] as u16;
    let prog_info_len = (((b[2] & 0x0F) as usize) << 8) | b[3] as usize;
    let mut idx = 4 + prog_info_len;
    if idx > b.len() {
        return Err(Error::Truncated {
            what: "PMT program_info descriptors",
            needed: prog_info_len,
            available: b.len() - 4,
        });
    }

    let mut streams = Vec::new();
    while idx + 5 <= b.len() {
        let stream_type = b[idx];
        let elementary_pid = (((b[idx + 1] & 0x1F) as u16) << 8) | b[idx + 2] as u16;
        let es_info_len = (((b[idx + 3] & 0x0F) as usize) << 8) | b[idx + 4] as usize;
        streams.push(StreamInfo { stream_type, elementary_pid });
        idx += 5 + es_info_len;
    }
    if idx > b.len() {
        // last ES_info loop overruns the section; the entry itself was read
        log::debug!(
            "PMT program {}: ES_info runs {} bytes past the section",
            syntax.table_id_extension,
            idx - b.len()
        );
    }

    Ok(PmtSection {
        program_number: syntax.table_id_extension,
        version: syntax.version,
        pcr_pid,
        streams,
    })
}
