//! Index records and the string encoding they use

use byteorder::{ReadBytesExt, LE};
use gamearc_core::{
    block::Block,
    error::{Error, Result},
    ParseContext,
};
use std::io;

use crate::footer::Version;

pub(crate) trait ReadExt {
    fn read_hash(&mut self) -> Result<[u8; 20]>;
    fn read_fstring(&mut self, ctx: &ParseContext) -> Result<String>;
}

impl<R: io::Read> ReadExt for R {
    fn read_hash(&mut self) -> Result<[u8; 20]> {
        let mut hash = [0; 20];
        self.read_exact(&mut hash)?;
        Ok(hash)
    }

    fn read_fstring(&mut self, ctx: &ParseContext) -> Result<String> {
        let size = self.read_i32::<LE>()?;
        let length = ctx.check_filename_length(size.unsigned_abs())?;

        let mut value = if size < 0 {
            let units = (0..length)
                .map(|_| self.read_u16::<LE>())
                .collect::<io::Result<Vec<_>>>()?;
            String::from_utf16(&units)
                .map_err(|e| Error::MalformedHeader(format!("invalid utf-16 string: {e}")))?
        } else {
            let mut bytes = vec![0; length];
            self.read_exact(&mut bytes)?;
            String::from_utf8(bytes)
                .map_err(|e| Error::MalformedHeader(format!("invalid utf-8 string: {e}")))?
        };

        // drop the terminator
        if value.ends_with('\0') {
            value.pop();
        }
        Ok(value)
    }
}

/// Compression of a record's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stored as-is
    None,

    /// Zlib
    Zlib,

    /// Any method this crate cannot decompress, with its raw value
    Unsupported(u32),
}

impl From<u32> for CompressionMethod {
    fn from(value: u32) -> Self {
        match value {
            0 => CompressionMethod::None,
            1 => CompressionMethod::Zlib,
            other => CompressionMethod::Unsupported(other),
        }
    }
}

/// A file's record, found both in the index and in front of the file's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakRecord {
    /// Where the in-data copy of this record starts
    pub offset: u64,

    /// Size of the data as stored
    pub compressed: u64,

    /// Size of the data once decompressed
    pub uncompressed: u64,

    /// How the data is stored
    pub compression: CompressionMethod,

    /// Modification time, only present in version 1
    pub timestamp: Option<u64>,

    /// SHA-1 of the data as stored
    pub hash: [u8; 20],

    /// Absolute `(start, end)` ranges of the compressed blocks
    pub blocks: Vec<(u64, u64)>,

    /// Bit 0 marks encrypted data
    pub flags: u8,

    /// Uncompressed size of every block but the last
    pub block_size: u32,
}

impl PakRecord {
    /// Read one record
    pub fn read<R: io::Read>(reader: &mut R, version: Version, ctx: &ParseContext) -> Result<Self> {
        let offset = reader.read_u64::<LE>()?;
        let compressed = reader.read_u64::<LE>()?;
        let uncompressed = reader.read_u64::<LE>()?;
        let compression = CompressionMethod::from(reader.read_u32::<LE>()?);
        let timestamp = match version.has_timestamp() {
            true => Some(reader.read_u64::<LE>()?),
            false => None,
        };
        let hash = reader.read_hash()?;

        let mut blocks = Vec::new();
        if version.has_blocks() && compression != CompressionMethod::None {
            let count = ctx.check_num_files(reader.read_u32::<LE>()?)?;
            for _ in 0..count {
                blocks.push((reader.read_u64::<LE>()?, reader.read_u64::<LE>()?));
            }
        }

        let (flags, block_size) = match version.has_blocks() {
            true => (reader.read_u8()?, reader.read_u32::<LE>()?),
            false => (0, 0),
        };

        Ok(Self {
            offset,
            compressed,
            uncompressed,
            compression,
            timestamp,
            hash,
            blocks,
            flags,
            block_size,
        })
    }

    /// Whether the data is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & 1 != 0
    }

    /// Size of this record when written with `version`
    pub fn serialized_size(&self, version: Version) -> u64 {
        let mut size = 8 + 8 + 8 + 4 + 20;
        if version.has_timestamp() {
            size += 8;
        }
        if version.has_blocks() {
            if self.compression != CompressionMethod::None {
                size += 4 + 16 * self.blocks.len() as u64;
            }
            size += 1 + 4;
        }
        size
    }

    /// Where the file's data starts, past the in-data copy of this record
    pub fn data_offset(&self, version: Version) -> u64 {
        self.offset.saturating_add(self.serialized_size(version))
    }

    /// Turn the block ranges into a block table, checking each against the source
    pub fn block_table(&self, ctx: &ParseContext) -> Result<Vec<Block>> {
        let ranges = self
            .blocks
            .iter()
            .map(|&(start, end)| {
                let Some(length) = end.checked_sub(start) else {
                    return Err(Error::MalformedHeader(format!(
                        "compression block ends at {end} before it starts at {start}"
                    )));
                };
                ctx.check_range(start, length)
            })
            .collect::<Result<Vec<_>>>()?;

        gamearc_core::block::fixed_size_blocks(self.block_size as u64, self.uncompressed, ranges)
    }
}
