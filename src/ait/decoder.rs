// ait/decoder.rs
//! Application Information Table (table_id 0x74) decoding.

use log::{debug, info, warn};

use crate::ait::descriptors::{AppDescriptor, descriptors};
use crate::ait::selection::select_application;
use crate::constants::{
    DESCRIPTOR_TAG_APPLICATION, SECTION_CRC_SIZE, SECTION_HEADER_SIZE, TABLE_ID_AIT,
};
use crate::error::{Error, Result};
use crate::psi::section::{SectionHeader, SectionReader};
use crate::types::{AitEvent, ApplicationEntry, ControlCode};

/// version/current_next byte, section_number, last_section_number
const AIT_FIXED_HEADER: usize = 3;
/// organisation_id, application_id, control_code, descriptors loop length
const APP_ENTRY_HEADER: usize = 9;
/// Smallest remainder of the application loop still read as an entry
const MIN_APP_ENTRY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AitSection {
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub applications: Vec<ApplicationEntry>,
}

fn len12(hi: u8, lo: u8) -> usize {
    (((hi & 0x0F) as usize) << 8) | lo as usize
}

/// Parses the application loop of a complete AIT section. The CRC is not
/// checked here.
pub fn parse_ait(raw: &[u8]) -> Result<AitSection> {
    let header = SectionHeader::parse(raw)?;
    if header.table_id != TABLE_ID_AIT {
        return Err(Error::TableId {
            expected: TABLE_ID_AIT,
            found: header.table_id,
        });
    }
    let total = header.total_length();
    if total > raw.len() {
        return Err(Error::SectionTruncated {
            expected: total,
            available: raw.len(),
        });
    }
    if !header.has_crc() {
        return Err(Error::SectionTooShort(total));
    }

    let b = &raw[SECTION_HEADER_SIZE..total - SECTION_CRC_SIZE];
    if b.len() < AIT_FIXED_HEADER + 2 {
        return Err(Error::Truncated {
            what: "AIT header",
            needed: AIT_FIXED_HEADER + 2,
            available: b.len(),
        });
    }
    let version = (b[0] & 0x3E) >> 1;
    let current_next = b[0] & 0x01 != 0;

    let mut at = AIT_FIXED_HEADER;
    let common_len = len12(b[at], b[at + 1]);
    at += 2 + common_len;
    if at + 2 > b.len() {
        return Err(Error::Truncated {
            what: "AIT common descriptors",
            needed: common_len + 2,
            available: b.len() - AIT_FIXED_HEADER - 2,
        });
    }

    // full 16 bits; reserved bits set by some muxers are caught by the clamp
    let app_loop_len = u16::from_be_bytes([b[at], b[at + 1]]) as usize;
    at += 2;
    let end = (at + app_loop_len).min(b.len());
    if at + app_loop_len > b.len() {
        debug!(
            "AIT application loop claims {app_loop_len} bytes, {} available",
            b.len() - at
        );
    }

    Ok(AitSection {
        version,
        current_next,
        section_number: b[1],
        last_section_number: b[2],
        applications: parse_application_loop(&b[at..end]),
    })
}

fn parse_application_loop(mut rest: &[u8]) -> Vec<ApplicationEntry> {
    let mut apps = Vec::new();
    while rest.len() >= MIN_APP_ENTRY {
        if rest.len() < APP_ENTRY_HEADER {
            debug!("AIT: {} trailing bytes, too short for an entry", rest.len());
            break;
        }
        let mut app = ApplicationEntry {
            organisation_id: u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]),
            application_id: u16::from_be_bytes([rest[4], rest[5]]),
            control_code: Some(ControlCode::from(rest[6])),
            ..Default::default()
        };
        let desc_len = len12(rest[7], rest[8]);
        rest = &rest[APP_ENTRY_HEADER..];

        let overrun = desc_len > rest.len();
        let (desc, tail) = rest.split_at(desc_len.min(rest.len()));
        apply_descriptors(&mut app, desc);
        let app_id = app.application_id;
        apps.push(app);
        if overrun {
            warn!(
                "AIT: descriptors of app 0x{app_id:04X} overrun the loop ({desc_len} > {})",
                desc.len()
            );
            break;
        }
        rest = tail;
    }
    apps
}

/// Folds one entry's descriptor loop into it. A descriptor running past the
/// loop, or a URL-bearing descriptor that cannot be read, ends the loop;
/// what was read before it is kept.
fn apply_descriptors(app: &mut ApplicationEntry, data: &[u8]) {
    for item in descriptors(data) {
        let d = match item {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "AIT app 0x{:08X}/0x{:04X}: descriptor loop aborted: {e}",
                    app.organisation_id, app.application_id
                );
                return;
            }
        };
        let desc = match AppDescriptor::parse(&d) {
            Ok(desc) => desc,
            // informational only, its bytes are already skipped
            Err(e) if d.tag == DESCRIPTOR_TAG_APPLICATION => {
                debug!(
                    "AIT app 0x{:08X}/0x{:04X}: application descriptor ignored: {e}",
                    app.organisation_id, app.application_id
                );
                continue;
            }
            Err(e) => {
                warn!(
                    "AIT app 0x{:08X}/0x{:04X}: descriptor loop aborted: {e}",
                    app.organisation_id, app.application_id
                );
                return;
            }
        };
        match desc {
            AppDescriptor::Application(a) => app.priority = Some(a.priority),
            AppDescriptor::TransportProtocol(tp) => {
                // an HTTP transport is never displaced by a later non-HTTP one
                if tp.url_base.is_some() || !app.is_http() {
                    app.protocol_id = Some(tp.protocol_id);
                }
                if tp.url_base.is_some() {
                    app.url_base = tp.url_base;
                    app.url_extension = tp.url_extension;
                }
            }
            AppDescriptor::SimpleLocation { initial_path } => app.initial_path = Some(initial_path),
            AppDescriptor::Unknown { tag } => debug!("AIT: skipping descriptor tag 0x{tag:02X}"),
        }
    }
}

/// Decodes AIT sections and reduces each to one [`AitEvent`].
#[derive(Debug, Default)]
pub struct AitDecoder {
    sections_decoded: u64,
    last_version: Option<u8>,
}

impl AitDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry point for sections already CRC-checked upstream. Anything but
    /// table_id 0x74, and any section whose header cannot be read, yields
    /// `None`.
    pub fn on_section(&mut self, table_id: u8, raw: &[u8]) -> Option<AitEvent> {
        if table_id != TABLE_ID_AIT {
            debug!("AIT decoder: ignoring table_id 0x{table_id:02X}");
            return None;
        }
        let ait = match parse_ait(raw) {
            Ok(a) => a,
            Err(e) => {
                warn!("AIT section dropped: {e}");
                return None;
            }
        };

        self.sections_decoded += 1;
        if self.last_version != Some(ait.version) {
            debug!(
                "AIT version {} section {}/{}: {} application(s)",
                ait.version,
                ait.section_number,
                ait.last_section_number,
                ait.applications.len()
            );
            self.last_version = Some(ait.version);
        }

        let event = select_application(&ait.applications);
        match &event {
            AitEvent::UrlFound(app) => info!(
                "HbbTV application 0x{:08X}/0x{:04X}: {} (autostart={})",
                app.org_id, app.app_id, app.url, app.autostart
            ),
            AitEvent::PresentButNoUrl { reason } => info!("AIT present, no URL: {reason}"),
            AitEvent::NoneDetected => {}
        }
        Some(event)
    }

    /// Entry point for a section isolated by the caller, positioned at its
    /// table_id byte. The CRC is validated here.
    pub fn feed_isolated_section(&mut self, raw: &[u8]) -> Option<AitEvent> {
        let sec = match SectionReader::new(raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("isolated section rejected: {e}");
                return None;
            }
        };
        self.on_section(sec.table_id(), sec.raw)
    }

    pub fn sections_decoded(&self) -> u64 {
        self.sections_decoded
    }

    pub fn last_version(&self) -> Option<u8> {
        self.last_version
    }
}
