//! Transport packet demultiplexing: fixed 188-byte framing, header fields and
//! payload slicing. Stateless per call.

use crate::constants::{SNIFF_PACKET_COUNT, TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::{Error, Result};

/// Parsed TS packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl TsHeader {
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control != 0
    }
}

/// One transport packet borrowed from the caller's buffer.
#[derive(Debug, Clone, Copy)]
pub struct TsPacket<'a> {
    pub header: TsHeader,
    /// Payload after the header and any adaptation field. Empty when the
    /// packet carries none.
    pub payload: &'a [u8],
}

impl<'a> TsPacket<'a> {
    /// Validates size and sync byte, then slices out the payload.
    pub fn parse(chunk: &'a [u8]) -> Result<Self> {
        if chunk.len() != TS_PACKET_SIZE {
            return Err(Error::PacketSize(chunk.len()));
        }
        if chunk[0] != TS_SYNC_BYTE {
            return Err(Error::SyncByte(chunk[0]));
        }

        let header = TsHeader {
            transport_error: chunk[1] & 0x80 != 0,
            payload_unit_start: chunk[1] & 0x40 != 0,
            pid: (((chunk[1] & 0x1F) as u16) << 8) | (chunk[2] as u16),
            scrambling_control: (chunk[3] >> 6) & 0x03,
            adaptation_field_control: (chunk[3] & 0x30) >> 4,
            continuity_counter: chunk[3] & 0x0F,
        };

        let mut payload_offset = TS_HEADER_SIZE;
        if header.has_adaptation_field() {
            let adap_len = chunk[4] as usize;
            payload_offset += 1 + adap_len;
        }

        let payload = if header.has_payload() && payload_offset < TS_PACKET_SIZE {
            &chunk[payload_offset..]
        } else {
            &[]
        };

        Ok(Self { header, payload })
    }

    pub fn pid(&self) -> u16 {
        self.header.pid
    }
}

/// True when the buffer starts with [`SNIFF_PACKET_COUNT`] consecutive
/// 188-byte frames that each begin with the sync byte.
pub fn sniff(data: &[u8]) -> bool {
    if data.len() < TS_PACKET_SIZE * SNIFF_PACKET_COUNT {
        return false;
    }
    (0..SNIFF_PACKET_COUNT).all(|i| data[i * TS_PACKET_SIZE] == TS_SYNC_BYTE)
}

/// Splits a byte buffer into 188-byte frames, resynchronising on the next
/// sync byte whenever a frame does not start with one.
pub struct TsPacketIter<'a> {
    data: &'a [u8],
    offset: usize,
    skipped: usize,
}

impl<'a> TsPacketIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut iter = Self { data, offset: 0, skipped: 0 };
        iter.resync();
        iter
    }

    /// Bytes discarded while hunting for sync.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Unconsumed tail shorter than one packet.
    pub fn remainder(&self) -> &'a [u8] {
        &self.data[self.offset.min(self.data.len())..]
    }

    fn resync(&mut self) {
        while self.offset < self.data.len() && self.data[self.offset] != TS_SYNC_BYTE {
            self.offset += 1;
            self.skipped += 1;
        }
    }
}

impl<'a> Iterator for TsPacketIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset + TS_PACKET_SIZE <= self.data.len() {
            if self.data[self.offset] != TS_SYNC_BYTE {
                self.offset += 1;
                self.skipped += 1;
                self.resync();
                continue;
            }
            let chunk = &self.data[self.offset..self.offset + TS_PACKET_SIZE];
            self.offset += TS_PACKET_SIZE;
            return Some(chunk);
        }
        None
    }
}
