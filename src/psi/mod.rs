pub mod pat;
pub mod pmt;
pub mod reassembler;
pub mod section;

pub use pat::{PatEntry, PatSection, parse_pat, pat_from_section};
pub use pmt::{PmtSection, StreamInfo, parse_pmt, pmt_from_section};
pub use reassembler::{ConsumerId, Reassembler, SectionConsumer, SectionContext};
pub use section::{SectionHeader, SectionReader, SyntaxHeader};
