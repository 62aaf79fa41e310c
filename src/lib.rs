// src/lib.rs
//! HbbTV application discovery from MPEG transport streams.
//!
//! Packets flow through [`packet`] (demux), [`psi::Reassembler`] (per-PID
//! section reassembly and table_id dispatch), the PAT → PMT → AIT consumer
//! chain in [`processor`], and finally [`ait::select_application`], which
//! reduces an AIT to one [`AitEvent`].

pub mod ait;
pub mod config;
pub mod constants;
pub mod error;
pub mod packet;
pub mod processor;
pub mod psi;
pub mod report;
pub mod stats;
pub mod types;
pub mod watchdog;

#[cfg(test)]
mod testutil;

pub use ait::{AitDecoder, select_application};
pub use config::InspectorConfig;
pub use error::{Error, Result};
pub use processor::PacketProcessor;
pub use types::{AitEvent, AitListener, ApplicationEntry, HbbTvAppUrl, NoUrlReason};
pub use watchdog::AitWatchdog;
