//! Compression markers and the strategies behind them.

use std::sync::Arc;

use binrw::{BinRead, BinWrite};
use gamearc_core::{
    error::{Error, Result},
    DecompressedStream, DecompressionStrategy, SharedSource, SharedStrategy, Stored, Zlib,
};
use tracing::instrument;

/// Identifies how a block or file inside a TRE archive is stored
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(repr = u32)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None = 0,

    /// Data compressed with zlib
    Zlib = 2,
}

impl TryFrom<u32> for CompressionMethod {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(CompressionMethod::None),
            2 => Ok(CompressionMethod::Zlib),
            other => Err(Error::MalformedHeader(format!(
                "unknown tre compression method {other}"
            ))),
        }
    }
}

impl CompressionMethod {
    /// The strategy decompressing data stored with this method
    pub fn strategy(self) -> SharedStrategy {
        match self {
            CompressionMethod::None => Arc::new(Stored),
            CompressionMethod::Zlib => Arc::new(Zlib),
        }
    }
}

/// Decompress one of the directory blocks into memory
#[instrument(skip(source), err)]
pub(crate) fn read_block(
    source: &SharedSource,
    offset: u64,
    compressed: u64,
    uncompressed: u64,
    compression: CompressionMethod,
) -> Result<Vec<u8>> {
    let mut stream = match compression {
        CompressionMethod::None => Stored.open(source, offset, compressed, uncompressed)?,
        CompressionMethod::Zlib => Zlib.open(source, offset, compressed, uncompressed)?,
    };

    let mut block = vec![0u8; uncompressed as usize];
    let mut filled = 0;
    while filled < block.len() {
        match stream.read(&mut block[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    if filled < block.len() {
        return Err(Error::MalformedHeader(format!(
            "directory block at {offset} holds {filled} of {uncompressed} bytes"
        )));
    }

    Ok(block)
}
