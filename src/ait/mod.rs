pub mod decoder;
pub mod descriptors;
pub mod selection;

pub use decoder::{AitDecoder, AitSection, parse_ait};
pub use descriptors::{AppDescriptor, ApplicationDescriptor, TransportProtocolDescriptor};
pub use selection::select_application;
