// ait/descriptors.rs
//! Descriptors found in the AIT application descriptor loop.

use bitstream_io::{BigEndian, BitRead, BitReader};

use crate::constants::{
    DESCRIPTOR_TAG_APPLICATION, DESCRIPTOR_TAG_SIMPLE_APPLICATION_LOCATION,
    DESCRIPTOR_TAG_TRANSPORT_PROTOCOL, PROTOCOL_ID_HTTP,
};
use crate::error::{Error, Result};

/// One tag/length/payload triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub tag: u8,
    pub payload: &'a [u8],
}

/// Walks a descriptor loop. Yields one `Err` and stops when a length
/// runs past the end of the loop.
pub struct DescriptorIter<'a> {
    data: &'a [u8],
    failed: bool,
}

pub fn descriptors(data: &[u8]) -> DescriptorIter<'_> {
    DescriptorIter { data, failed: false }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Result<Descriptor<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.is_empty() {
            return None;
        }
        if self.data.len() < 2 {
            self.failed = true;
            return Some(Err(Error::Truncated {
                what: "descriptor header",
                needed: 2,
                available: self.data.len(),
            }));
        }
        let tag = self.data[0];
        let len = self.data[1] as usize;
        let rest = &self.data[2..];
        if len > rest.len() {
            self.failed = true;
            return Some(Err(Error::Truncated {
                what: "descriptor payload",
                needed: len,
                available: rest.len(),
            }));
        }
        let (payload, tail) = rest.split_at(len);
        self.data = tail;
        Some(Ok(Descriptor { tag, payload }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationProfile {
    pub profile: u16,
    pub version: (u8, u8, u8),
}

/// application_descriptor (tag 0x00)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    pub profiles: Vec<ApplicationProfile>,
    pub service_bound: bool,
    pub visibility: u8,
    pub priority: u8,
    pub transport_protocol_labels: Vec<u8>,
}

/// transport_protocol_descriptor (tag 0x02). URL fields are only read
/// for HTTP; other selectors are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportProtocolDescriptor {
    pub protocol_id: u16,
    pub label: u8,
    pub url_base: Option<String>,
    pub url_extension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppDescriptor {
    Application(ApplicationDescriptor),
    TransportProtocol(TransportProtocolDescriptor),
    SimpleLocation { initial_path: String },
    Unknown { tag: u8 },
}

impl AppDescriptor {
    pub fn parse(d: &Descriptor<'_>) -> Result<Self> {
        match d.tag {
            DESCRIPTOR_TAG_APPLICATION => parse_application(d.payload).map(Self::Application),
            DESCRIPTOR_TAG_TRANSPORT_PROTOCOL => {
                parse_transport_protocol(d.payload).map(Self::TransportProtocol)
            }
            DESCRIPTOR_TAG_SIMPLE_APPLICATION_LOCATION => {
                parse_simple_location(d.payload).map(|initial_path| Self::SimpleLocation { initial_path })
            }
            tag => Ok(Self::Unknown { tag }),
        }
    }
}

fn truncated(what: &'static str, payload: &[u8]) -> impl Fn(std::io::Error) -> Error {
    let available = payload.len();
    move |_| Error::Truncated {
        what,
        needed: available + 1,
        available,
    }
}

fn parse_application(payload: &[u8]) -> Result<ApplicationDescriptor> {
    let eof = truncated("application_descriptor", payload);
    let mut br = BitReader::endian(payload, BigEndian);

    let profiles_len = br.read::<8, u8>().map_err(&eof)? as usize;
    let mut profiles = Vec::with_capacity(profiles_len / 5);
    for _ in 0..profiles_len / 5 {
        let profile = br.read::<16, u16>().map_err(&eof)?;
        let major = br.read::<8, u8>().map_err(&eof)?;
        let minor = br.read::<8, u8>().map_err(&eof)?;
        let micro = br.read::<8, u8>().map_err(&eof)?;
        profiles.push(ApplicationProfile { profile, version: (major, minor, micro) });
    }
    br.skip((profiles_len % 5) as u32 * 8).map_err(&eof)?;

    let service_bound = br.read::<1, u8>().map_err(&eof)? != 0;
    let visibility = br.read::<2, u8>().map_err(&eof)?;
    br.skip(5).map_err(&eof)?;
    let priority = br.read::<8, u8>().map_err(&eof)?;

    let consumed = 1 + profiles_len + 2;
    let mut transport_protocol_labels = vec![0u8; payload.len().saturating_sub(consumed)];
    br.read_bytes(&mut transport_protocol_labels).map_err(&eof)?;

    Ok(ApplicationDescriptor {
        profiles,
        service_bound,
        visibility,
        priority,
        transport_protocol_labels,
    })
}

fn parse_transport_protocol(payload: &[u8]) -> Result<TransportProtocolDescriptor> {
    let eof = truncated("transport_protocol_descriptor", payload);
    let mut br = BitReader::endian(payload, BigEndian);

    let protocol_id = br.read::<16, u16>().map_err(&eof)?;
    let label = br.read::<8, u8>().map_err(&eof)?;
    let mut tp = TransportProtocolDescriptor {
        protocol_id,
        label,
        url_base: None,
        url_extension: None,
    };
    if protocol_id != PROTOCOL_ID_HTTP {
        return Ok(tp);
    }

    br.skip(8).map_err(&eof)?;
    let base_len = br.read::<8, u8>().map_err(&eof)? as usize;
    tp.url_base = Some(read_string(&mut br, base_len).map_err(&eof)?);

    let consumed = 5 + base_len;
    if payload.len() > consumed {
        let ext_len = br.read::<8, u8>().map_err(&eof)? as usize;
        tp.url_extension = Some(read_string(&mut br, ext_len).map_err(&eof)?);
    }
    Ok(tp)
}

fn parse_simple_location(payload: &[u8]) -> Result<String> {
    let eof = truncated("simple_application_location_descriptor", payload);
    let mut br = BitReader::endian(payload, BigEndian);
    let len = br.read::<8, u8>().map_err(&eof)? as usize;
    read_string(&mut br, len).map_err(&eof)
}

fn read_string<R: std::io::Read>(
    br: &mut BitReader<R, BigEndian>,
    len: usize,
) -> std::io::Result<String> {
    let mut buf = vec![0u8; len];
    br.read_bytes(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
