//! The fixed size trailer every PAK ends with

use byteorder::{ReadBytesExt, LE};
use gamearc_core::error::{Error, Result};
use std::io;

use crate::record::ReadExt;

/// Magic number found at the start of the footer proper
pub const MAGIC: u32 = 0x5A6F12E1;

/// Size of the footer without the version 4 encryption flag
pub const FOOTER_SIZE: u64 = 44;

/// Supported layout versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    /// The initial layout, records carry a timestamp
    V1 = 1,

    /// Timestamps removed
    V2 = 2,

    /// Compression blocks and encryption flags added
    V3 = 3,

    /// Index encryption flag added to the footer
    V4 = 4,
}

impl TryFrom<u32> for Version {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Version::V1),
            2 => Ok(Version::V2),
            3 => Ok(Version::V3),
            4 => Ok(Version::V4),
            other => Err(Error::MalformedHeader(format!(
                "pak version {other} is not supported"
            ))),
        }
    }
}

impl Version {
    /// Size of the footer for this version
    pub fn footer_size(self) -> u64 {
        match self {
            Version::V4 => FOOTER_SIZE + 1,
            _ => FOOTER_SIZE,
        }
    }

    /// Whether records carry a timestamp
    pub fn has_timestamp(self) -> bool {
        self == Version::V1
    }

    /// Whether records carry compression blocks, flags and a block size
    pub fn has_blocks(self) -> bool {
        self >= Version::V3
    }
}

/// The PAK footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    /// Whether the index is encrypted, always false before version 4
    pub encrypted: bool,

    /// Layout version
    pub version: Version,

    /// Where the index starts
    pub index_offset: u64,

    /// Size of the index
    pub index_size: u64,

    /// SHA-1 of the index
    pub hash: [u8; 20],
}

impl Footer {
    /// Read a footer of the given `version`, positioned at its first byte
    pub fn read<R: io::Read>(reader: &mut R, version: Version) -> Result<Self> {
        let encrypted = match version {
            Version::V4 => reader.read_u8()? != 0,
            _ => false,
        };

        let magic = reader.read_u32::<LE>()?;
        if magic != MAGIC {
            return Err(Error::MalformedHeader(format!(
                "found magic of {magic:#x} instead of {MAGIC:#x}"
            )));
        }

        let found = Version::try_from(reader.read_u32::<LE>()?)?;
        if found != version {
            return Err(Error::MalformedHeader(format!(
                "expected a version {} footer but found version {}",
                version as u32, found as u32
            )));
        }

        Ok(Self {
            encrypted,
            version,
            index_offset: reader.read_u64::<LE>()?,
            index_size: reader.read_u64::<LE>()?,
            hash: reader.read_hash()?,
        })
    }
}
