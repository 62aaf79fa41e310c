//! Section and packet builders shared by the unit tests.

use crate::constants::*;
use crate::psi::section::crc32_mpeg2;

/// Prefixes the 3-byte header (syntax indicator set) and appends the CRC.
pub fn finish_section(table_id: u8, body: &[u8]) -> Vec<u8> {
    let section_length = body.len() + SECTION_CRC_SIZE;
    let mut out = vec![
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
    ];
    out.extend_from_slice(body);
    let crc = crc32_mpeg2(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Long-form section: extension, version/current_next, section numbers, data.
pub fn long_section(table_id: u8, extension: u16, version: u8, data: &[u8]) -> Vec<u8> {
    let mut body = extension.to_be_bytes().to_vec();
    body.extend_from_slice(&[0xC1 | ((version & 0x1F) << 1), 0x00, 0x00]);
    body.extend_from_slice(data);
    finish_section(table_id, &body)
}

pub fn pat_section(tsid: u16, programs: &[(u16, u16)]) -> Vec<u8> {
    let mut entries = Vec::new();
    for &(program_number, pid) in programs {
        entries.extend_from_slice(&program_number.to_be_bytes());
        entries.extend_from_slice(&(0xE000 | pid).to_be_bytes());
    }
    let mut data = (0xF000 | entries.len() as u16).to_be_bytes().to_vec();
    data.extend(entries);
    long_section(TABLE_ID_PAT, tsid, 0, &data)
}

pub fn pmt_section(program_number: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut data = (0xE000 | pcr_pid).to_be_bytes().to_vec();
    // one dummy program_info descriptor so the skip is exercised
    data.extend_from_slice(&[0xF0, 0x03, 0x52, 0x01, 0x00]);
    for &(stream_type, pid) in streams {
        data.push(stream_type);
        data.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        data.extend_from_slice(&[0xF0, 0x02, 0x52, 0x01]);
    }
    long_section(TABLE_ID_PMT, program_number, 0, &data)
}

/// One application entry of an AIT application loop.
pub struct TestApp {
    pub org_id: u32,
    pub app_id: u16,
    pub control_code: u8,
    pub descriptors: Vec<u8>,
}

impl TestApp {
    pub fn new(org_id: u32, app_id: u16, control_code: u8) -> Self {
        Self { org_id, app_id, control_code, descriptors: Vec::new() }
    }

    pub fn http(mut self, base: &str, extension: Option<&str>) -> Self {
        self.descriptors
            .extend(transport_protocol(PROTOCOL_ID_HTTP, base, extension));
        self
    }

    pub fn dsmcc(mut self) -> Self {
        self.descriptors
            .extend_from_slice(&[DESCRIPTOR_TAG_TRANSPORT_PROTOCOL, 0x07, 0x00, 0x01, 0x01, 0x00, 0x00, 0x10, 0x0C]);
        self
    }

    pub fn location(mut self, path: &str) -> Self {
        self.descriptors.push(DESCRIPTOR_TAG_SIMPLE_APPLICATION_LOCATION);
        self.descriptors.push(path.len() as u8 + 1);
        self.descriptors.push(path.len() as u8);
        self.descriptors.extend_from_slice(path.as_bytes());
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.descriptors.extend_from_slice(bytes);
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.org_id.to_be_bytes().to_vec();
        out.extend_from_slice(&self.app_id.to_be_bytes());
        out.push(self.control_code);
        out.extend_from_slice(&(self.descriptors.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.descriptors);
        out
    }
}

pub fn transport_protocol(protocol_id: u16, base: &str, extension: Option<&str>) -> Vec<u8> {
    let mut payload = protocol_id.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0x01, 0x00]);
    payload.push(base.len() as u8);
    payload.extend_from_slice(base.as_bytes());
    if let Some(ext) = extension {
        payload.push(ext.len() as u8);
        payload.extend_from_slice(ext.as_bytes());
    }
    let mut out = vec![DESCRIPTOR_TAG_TRANSPORT_PROTOCOL, payload.len() as u8];
    out.extend(payload);
    out
}

/// Full AIT section, version 3: version byte, section numbers, one common
/// descriptor, then the application loop behind a 16-bit length.
pub fn ait_section(apps: &[TestApp]) -> Vec<u8> {
    let mut body = vec![0xC1 | (3 << 1), 0x00, 0x00, 0xF0, 0x03, 0x14, 0x01, 0x00];
    let app_loop: Vec<u8> = apps.iter().flat_map(TestApp::encode).collect();
    body.extend_from_slice(&(app_loop.len() as u16).to_be_bytes());
    body.extend(app_loop);
    finish_section(TABLE_ID_AIT, &body)
}

/// Splits a section into TS packets on `pid`. The first carries
/// payload_unit_start and a zero pointer_field; the tail is 0xFF stuffed.
pub fn packetize(pid: u16, section: &[u8], cc_start: u8) -> Vec<[u8; TS_PACKET_SIZE]> {
    let mut packets = Vec::new();
    let mut remaining = section;
    let mut cc = cc_start;
    let mut first = true;
    while first || !remaining.is_empty() {
        let mut p = [0xFFu8; TS_PACKET_SIZE];
        p[0] = TS_SYNC_BYTE;
        p[1] = (if first { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
        p[2] = pid as u8;
        p[3] = 0x10 | (cc & 0x0F);
        let mut at = TS_HEADER_SIZE;
        if first {
            p[at] = 0x00;
            at += 1;
        }
        let take = remaining.len().min(TS_PACKET_SIZE - at);
        p[at..at + take].copy_from_slice(&remaining[..take]);
        remaining = &remaining[take..];
        packets.push(p);
        cc = cc.wrapping_add(1);
        first = false;
    }
    packets
}
