//! Decompression strategies and the pull-based streams they produce.
//!
//! A [`DecompressionStrategy`] is an immutable description of how a compressed range turns into
//! output bytes. Opening it over a range of a [`SharedSource`] yields a [`DecompressedStream`]
//! which hands out exactly the expected number of bytes on demand. Dropping the stream closes it.

use std::{
    fmt::Debug,
    io::{self, BufReader, Read},
    sync::Arc,
};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use tracing::instrument;

use crate::{
    error::{Error, Result},
    source::{RangeReader, SharedSource},
};

/// A pluggable decompression algorithm
///
/// Implementations may parse a codec specific sub-header positioned at `offset` when opened.
pub trait DecompressionStrategy: Debug + Send + Sync {
    /// Short human readable name, used in listings and error messages
    fn name(&self) -> &'static str;

    /// Begin decompressing `compressed_length` bytes of `source` starting at `offset`.
    ///
    /// The returned stream must yield exactly `decompressed_length` bytes.
    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>>;
}

/// A lazy, finite, non-restartable sequence of decompressed bytes
pub trait DecompressedStream: Send {
    /// Whether another byte can be read
    fn available(&self) -> bool;

    /// Read the next byte
    ///
    /// Fails with [`Error::ExhaustedStream`] when [`DecompressedStream::available`] is false.
    fn read_byte(&mut self) -> Result<u8>;

    /// Number of bytes handed out so far
    fn produced(&self) -> u64;

    /// Fill as much of `buf` as possible, returning the count. `Ok(0)` means the stream is done.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        while count < buf.len() && self.available() {
            buf[count] = self.read_byte()?;
            count += 1;
        }
        Ok(count)
    }
}

/// Shared handle to a strategy, as stored on entries and block tables
pub type SharedStrategy = Arc<dyn DecompressionStrategy>;

/// Stream over any [`Read`] that is cut off at the expected output length
///
/// Running out of input before the expected length is reported as a codec error.
struct ReaderStream<R> {
    codec: &'static str,
    inner: R,
    expected: u64,
    produced: u64,
}

impl<R: Read + Send> ReaderStream<R> {
    fn new(codec: &'static str, inner: R, expected: u64) -> Self {
        Self {
            codec,
            inner,
            expected,
            produced: 0,
        }
    }

    fn remaining(&self) -> u64 {
        self.expected - self.produced
    }

    fn map_err(&self, e: io::Error) -> Error {
        match e.kind() {
            // bounded input ends with Ok(0), an early end comes from the decoder
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => {
                Error::codec(self.codec, e.to_string())
            }
            _ => Error::IOError(e),
        }
    }

    fn truncated(&self) -> Error {
        Error::codec(
            self.codec,
            format!(
                "data ends after {} of {} bytes",
                self.produced, self.expected
            ),
        )
    }
}

impl<R: Read + Send> DecompressedStream for ReaderStream<R> {
    fn available(&self) -> bool {
        self.produced < self.expected
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        match DecompressedStream::read(self, &mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(Error::ExhaustedStream),
        }
    }

    fn produced(&self) -> u64 {
        self.produced
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limit = self.remaining().min(buf.len() as u64) as usize;
        if limit == 0 {
            return Ok(0);
        }

        let read = loop {
            match self.inner.read(&mut buf[..limit]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.map_err(e)),
            }
        };
        if read == 0 {
            return Err(self.truncated());
        }

        self.produced += read as u64;
        Ok(read)
    }
}

/// Data stored as-is; the compressed range is the output
#[derive(Debug, Clone, Copy, Default)]
pub struct Stored;

impl DecompressionStrategy for Stored {
    fn name(&self) -> &'static str {
        "Default"
    }

    #[instrument(skip(source), level = "trace", err)]
    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        let reader = BufReader::new(RangeReader::new(source.clone(), offset, compressed_length));
        Ok(Box::new(ReaderStream::new(
            self.name(),
            reader,
            decompressed_length,
        )))
    }
}

/// Data compressed with a zlib wrapped deflate stream
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlib;

impl DecompressionStrategy for Zlib {
    fn name(&self) -> &'static str {
        "ZLib"
    }

    #[instrument(skip(source), level = "trace", err)]
    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        let reader = BufReader::new(RangeReader::new(source.clone(), offset, compressed_length));
        Ok(Box::new(ReaderStream::new(
            self.name(),
            BufReader::new(ZlibDecoder::new(reader)),
            decompressed_length,
        )))
    }
}

/// Data compressed with a raw deflate stream, no zlib header
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

impl DecompressionStrategy for Deflate {
    fn name(&self) -> &'static str {
        "Deflate"
    }

    #[instrument(skip(source), level = "trace", err)]
    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        let reader = BufReader::new(RangeReader::new(source.clone(), offset, compressed_length));
        Ok(Box::new(ReaderStream::new(
            self.name(),
            BufReader::new(DeflateDecoder::new(reader)),
            decompressed_length,
        )))
    }
}

const LZSS_WINDOW: usize = 4096;
const LZSS_MAX_MATCH: usize = 18;
const LZSS_THRESHOLD: usize = 2;

/// The 4 KiB window LZSS found in a large number of game formats
///
/// Each flag byte describes the next eight items, low bit first: a set bit is a literal byte, a
/// clear bit is a two byte back reference holding a 12 bit window position and a 4 bit length.
/// The window starts filled with spaces and the write cursor starts at `0xFEE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lzss;

impl DecompressionStrategy for Lzss {
    fn name(&self) -> &'static str {
        "LZSS"
    }

    #[instrument(skip(source), level = "trace", err)]
    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        Ok(Box::new(LzssStream {
            input: BufReader::new(RangeReader::new(source.clone(), offset, compressed_length)),
            window: [b' '; LZSS_WINDOW],
            cursor: LZSS_WINDOW - LZSS_MAX_MATCH,
            flags: 0,
            copy_from: 0,
            copy_left: 0,
            expected: decompressed_length,
            produced: 0,
        }))
    }
}

struct LzssStream {
    input: BufReader<RangeReader>,
    window: [u8; LZSS_WINDOW],
    cursor: usize,
    flags: u16,
    copy_from: usize,
    copy_left: usize,
    expected: u64,
    produced: u64,
}

impl LzssStream {
    fn next_input(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        match self.input.read(&mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(Error::codec(
                "LZSS",
                format!(
                    "input ends after {} of {} bytes",
                    self.produced, self.expected
                ),
            )),
        }
    }

    fn emit(&mut self, byte: u8) -> u8 {
        self.window[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & (LZSS_WINDOW - 1);
        self.produced += 1;
        byte
    }
}

impl DecompressedStream for LzssStream {
    fn available(&self) -> bool {
        self.produced < self.expected
    }

    fn read_byte(&mut self) -> Result<u8> {
        if !self.available() {
            return Err(Error::ExhaustedStream);
        }

        loop {
            if self.copy_left > 0 {
                let byte = self.window[self.copy_from];
                self.copy_from = (self.copy_from + 1) & (LZSS_WINDOW - 1);
                self.copy_left -= 1;
                return Ok(self.emit(byte));
            }

            self.flags >>= 1;
            if self.flags & 0x100 == 0 {
                self.flags = u16::from(self.next_input()?) | 0xFF00;
            }

            if self.flags & 1 != 0 {
                let byte = self.next_input()?;
                return Ok(self.emit(byte));
            }

            let low = usize::from(self.next_input()?);
            let high = usize::from(self.next_input()?);
            self.copy_from = low | ((high & 0xF0) << 4);
            self.copy_left = (high & 0x0F) + LZSS_THRESHOLD + 1;
        }
    }

    fn produced(&self) -> u64 {
        self.produced
    }
}
