#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid TS packet size: {0}, expected 188")]
    PacketSize(usize),

    #[error("Wrong sync byte: 0x{0:02X}")]
    SyncByte(u8),

    #[error("Section too short for header: {0} bytes")]
    SectionTooShort(usize),

    #[error("Section truncated: expected {expected} bytes, got {available}")]
    SectionTruncated { expected: usize, available: usize },

    #[error("CRC-32 mismatch: computed 0x{computed:08X}, trailer 0x{trailer:08X}")]
    CrcMismatch { computed: u32, trailer: u32 },

    #[error("Unexpected table_id 0x{found:02X}, expected 0x{expected:02X}")]
    TableId { expected: u8, found: u8 },

    #[error("{what} truncated: needs {needed} bytes, {available} left")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
