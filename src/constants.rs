//! Constants for MPEG-TS / PSI processing and HbbTV AIT signalling

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Frames that must line up on 0x47 before a buffer is accepted as TS
pub const SNIFF_PACKET_COUNT: usize = 4;

/// PSI section header: table_id + syntax/length word
pub const SECTION_HEADER_SIZE: usize = 3;
pub const SECTION_CRC_SIZE: usize = 4;
/// Per-PID accumulator bound before a forced reset
pub const MAX_SECTION_SIZE: usize = 4096;

/// Well-known PIDs
pub const PAT_PID: u16 = 0x0000;
pub const NULL_PID: u16 = 0x1FFF;

/// table_id values
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TABLE_ID_AIT: u8 = 0x74;

/// PMT stream types that may carry an AIT (private sections / DSM-CC)
pub const STREAM_TYPE_PRIVATE_SECTIONS: u8 = 0x05;
pub const STREAM_TYPE_PRIVATE_PES: u8 = 0x06;

/// AIT descriptor tags (ETSI TS 102 809)
pub const DESCRIPTOR_TAG_APPLICATION: u8 = 0x00;
pub const DESCRIPTOR_TAG_TRANSPORT_PROTOCOL: u8 = 0x02;
pub const DESCRIPTOR_TAG_SIMPLE_APPLICATION_LOCATION: u8 = 0x15;

/// transport protocol_id values
pub const PROTOCOL_ID_DSM_CC: u16 = 0x0001;
pub const PROTOCOL_ID_HTTP: u16 = 0x0003;

/// application_control_code values
pub const CONTROL_CODE_AUTOSTART: u8 = 0x01;
pub const CONTROL_CODE_PRESENT: u8 = 0x02;

/// Deadline for the "no AIT detected" signal
pub const AIT_TIMEOUT_MS: u64 = 5000;

/// Canonical PresentButNoUrl reasons
pub const REASON_NO_APPLICATIONS: &str = "no applications found in AIT";
pub const REASON_NO_HTTP_APPLICATIONS: &str = "no HTTP applications found (only DSM-CC or other)";
