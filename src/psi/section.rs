// psi/section.rs
//! Generic PSI / SI section reader with CRC-32 (MPEG-2) validation.

use crc::{CRC_32_MPEG_2, Crc};

use crate::constants::{SECTION_CRC_SIZE, SECTION_HEADER_SIZE};
use crate::error::{Error, Result};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}

/// The 3-byte header shared by every PSI section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
}

impl SectionHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SECTION_HEADER_SIZE {
            return Err(Error::SectionTooShort(data.len()));
        }
        Ok(Self {
            table_id: data[0],
            section_syntax_indicator: data[1] & 0x80 != 0,
            section_length: (((data[1] & 0x0F) as u16) << 8) | data[2] as u16,
        })
    }

    /// table_id + length word + section_length
    pub fn total_length(&self) -> usize {
        SECTION_HEADER_SIZE + self.section_length as usize
    }

    pub fn has_crc(&self) -> bool {
        self.section_length as usize >= SECTION_CRC_SIZE
    }
}

/// Checks the big-endian CRC-32 trailer of a complete section.
pub fn verify_crc(section: &[u8]) -> Result<()> {
    if section.len() < SECTION_CRC_SIZE {
        return Err(Error::SectionTooShort(section.len()));
    }
    let split = section.len() - SECTION_CRC_SIZE;
    let computed = crc32_mpeg2(&section[..split]);
    let trailer = u32::from_be_bytes([
        section[split],
        section[split + 1],
        section[split + 2],
        section[split + 3],
    ]);
    if computed != trailer {
        return Err(Error::CrcMismatch { computed, trailer });
    }
    Ok(())
}

/// Returned by [`SectionReader::new`].
#[derive(Debug, Clone, Copy)]
pub struct SectionReader<'a> {
    pub header: SectionHeader,
    /// Exactly `total_length` bytes, starting at table_id.
    pub raw: &'a [u8],
}

impl<'a> SectionReader<'a> {
    /// Reads one section positioned at its table_id byte. Validates length
    /// and, when the section is long enough to carry one, the CRC-32.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let header = SectionHeader::parse(data)?;
        let end = header.total_length();
        if end > data.len() {
            return Err(Error::SectionTruncated {
                expected: end,
                available: data.len(),
            });
        }
        let raw = &data[..end];
        if header.has_crc() {
            verify_crc(raw)?;
        }
        Ok(Self { header, raw })
    }

    /// Wraps an already validated section without re-checking the CRC.
    pub fn trusted(data: &'a [u8]) -> Result<Self> {
        let header = SectionHeader::parse(data)?;
        let end = header.total_length();
        if end > data.len() {
            return Err(Error::SectionTruncated {
                expected: end,
                available: data.len(),
            });
        }
        Ok(Self { header, raw: &data[..end] })
    }

    pub fn table_id(&self) -> u8 {
        self.header.table_id
    }

    /// Bytes between the 3-byte header and the CRC trailer.
    pub fn body(&self) -> &'a [u8] {
        let end = if self.header.has_crc() {
            self.raw.len() - SECTION_CRC_SIZE
        } else {
            self.raw.len()
        };
        &self.raw[SECTION_HEADER_SIZE..end]
    }

    /// Long-form header fields that follow the length word when
    /// section_syntax_indicator is set.
    pub fn syntax_header(&self) -> Option<SyntaxHeader> {
        let b = self.body();
        if !self.header.section_syntax_indicator || b.len() < 5 {
            return None;
        }
        Some(SyntaxHeader {
            table_id_extension: u16::from_be_bytes([b[0], b[1]]),
            version: (b[2] & 0x3E) >> 1,
            current_next: b[2] & 0x01 != 0,
            section_number: b[3],
            last_section_number: b[4],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxHeader {
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}
