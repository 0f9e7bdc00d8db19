//! The logical file record every format plugin produces

use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    io::Read,
};

use crate::{
    error::{Error, Result},
    ext::{guess_extension, SNIFF_LENGTH},
    source::SharedSource,
    strategy::{DecompressedStream, DecompressionStrategy, SharedStrategy, Stored},
};

/// A logical file inside a container archive
///
/// Holds where the file's bytes live in the backing source, how many there are before and after
/// decompression, and which [`DecompressionStrategy`] turns one into the other. Entries without
/// a strategy are passed through raw.
#[derive(Clone)]
pub struct Entry {
    source: SharedSource,
    name: String,
    offset: u64,
    length: u64,
    decompressed_length: u64,
    strategy: Option<SharedStrategy>,
    properties: IndexMap<String, String>,
}

impl Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("decompressed_length", &self.decompressed_length)
            .field("strategy", &self.strategy_name())
            .field("properties", &self.properties)
            .finish()
    }
}

fn check_location(source: &SharedSource, offset: u64, length: u64) -> Result<()> {
    let bound = source.len();
    if offset > bound {
        return Err(Error::OutOfRange {
            field: "offset",
            value: i64::try_from(offset).unwrap_or(i64::MAX),
            bound: i64::try_from(bound).unwrap_or(i64::MAX),
        });
    }

    let room = bound - offset;
    if length > room {
        return Err(Error::OutOfRange {
            field: "length",
            value: i64::try_from(length).unwrap_or(i64::MAX),
            bound: i64::try_from(room).unwrap_or(i64::MAX),
        });
    }

    Ok(())
}

impl Entry {
    /// Describe `length` stored bytes of `source` starting at `offset`
    ///
    /// Fails with [`Error::OutOfRange`] when the range does not lie within the source.
    pub fn new(
        source: SharedSource,
        name: impl Into<String>,
        offset: u64,
        length: u64,
    ) -> Result<Self> {
        check_location(&source, offset, length)?;

        Ok(Self {
            source,
            name: name.into(),
            offset,
            length,
            decompressed_length: length,
            strategy: None,
            properties: IndexMap::new(),
        })
    }

    /// Describe a compressed entry in one go
    pub fn compressed(
        source: SharedSource,
        name: impl Into<String>,
        offset: u64,
        length: u64,
        decompressed_length: u64,
        strategy: SharedStrategy,
    ) -> Result<Self> {
        let mut entry = Self::new(source, name, offset, length)?;
        entry.set_compression(strategy, decompressed_length);
        Ok(entry)
    }

    /// Get the name of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the name, e.g. once a filename table has been resolved
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the starting offset of the entry's data in the source
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the size of the file, in bytes, in the archive
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Get the size of the file, in bytes, when decompressed
    pub fn decompressed_length(&self) -> u64 {
        self.decompressed_length
    }

    /// Move the entry's data, e.g. after discovering a nested header in front of it
    ///
    /// An uncompressed entry's decompressed length follows its new length.
    pub fn set_location(&mut self, offset: u64, length: u64) -> Result<()> {
        check_location(&self.source, offset, length)?;

        self.offset = offset;
        self.length = length;
        if self.strategy.is_none() {
            self.decompressed_length = length;
        }
        Ok(())
    }

    /// The strategy assigned to this entry, if any
    pub fn strategy(&self) -> Option<&SharedStrategy> {
        self.strategy.as_ref()
    }

    /// Name of the assigned strategy, `"Default"` for raw entries
    pub fn strategy_name(&self) -> &'static str {
        self.strategy
            .as_ref()
            .map_or_else(|| Stored.name(), |s| s.name())
    }

    /// Whether a strategy has been assigned
    pub fn is_compressed(&self) -> bool {
        self.strategy.is_some()
    }

    /// Assign a strategy producing `decompressed_length` bytes
    pub fn set_compression(&mut self, strategy: SharedStrategy, decompressed_length: u64) {
        self.strategy = Some(strategy);
        self.decompressed_length = decompressed_length;
    }

    /// Remove the strategy, treating the data as stored
    pub fn clear_compression(&mut self) {
        self.strategy = None;
        self.decompressed_length = self.length;
    }

    /// The source this entry reads from
    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    /// Format specific metadata, in insertion order
    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    /// Look up a single property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Set a property, replacing any previous value for `key`
    pub fn set_property(&mut self, key: impl Into<String>, value: impl ToString) {
        self.properties.insert(key.into(), value.to_string());
    }

    /// Start decompressing the entry
    ///
    /// Nothing is read from the source until the returned reader is pulled from.
    pub fn open(&self) -> Result<EntryReader> {
        let stream = match &self.strategy {
            Some(strategy) => strategy.open(
                &self.source,
                self.offset,
                self.length,
                self.decompressed_length,
            )?,
            None => Stored.open(&self.source, self.offset, self.length, self.length)?,
        };

        Ok(EntryReader { stream })
    }

    /// Decompress up to `count` leading bytes without touching the rest of the data
    pub fn peek(&self, count: usize) -> Result<Vec<u8>> {
        let mut reader = self.open()?;
        let mut buffer = vec![0u8; count.min(self.decompressed_length as usize)];

        let mut filled = 0;
        while filled < buffer.len() {
            match DecompressedStream::read(reader.stream.as_mut(), &mut buffer[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        buffer.truncate(filled);

        Ok(buffer)
    }

    /// Guess an extension from the entry's leading bytes
    pub fn guess_extension(&self) -> Result<Option<&'static str>> {
        Ok(guess_extension(&self.peek(SNIFF_LENGTH)?))
    }

    /// Read and decompress the whole entry into memory
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut reader = self.open()?;
        let mut buffer = Vec::with_capacity(self.decompressed_length.min(1 << 24) as usize);
        let mut chunk = [0u8; 8192];
        loop {
            match DecompressedStream::read(reader.stream.as_mut(), &mut chunk)? {
                0 => break,
                n => buffer.extend_from_slice(&chunk[..n]),
            }
        }
        Ok(buffer)
    }
}

/// A pull-based reader over an entry's decompressed bytes
///
/// Offers the byte-at-a-time [`EntryReader::available`] / [`EntryReader::read_byte`] contract as
/// well as [`std::io::Read`].
pub struct EntryReader {
    stream: Box<dyn DecompressedStream>,
}

impl EntryReader {
    /// Whether another byte can be read
    pub fn available(&self) -> bool {
        self.stream.available()
    }

    /// Read the next byte, failing with [`Error::ExhaustedStream`] once the entry is drained
    pub fn read_byte(&mut self) -> Result<u8> {
        self.stream.read_byte()
    }

    /// Number of bytes read so far
    pub fn position(&self) -> u64 {
        self.stream.produced()
    }
}

impl Debug for EntryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryReader(position: {})", self.position())
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(DecompressedStream::read(self.stream.as_mut(), buf)?)
    }
}

#[cfg(test)]
mod test {
    use std::{io::Read, sync::Arc};

    use pretty_assertions::assert_eq;

    use crate::entry::Entry;
    use crate::error::{Error, Result};
    use crate::source::MemorySource;
    use crate::strategy::{Lzss, Zlib};

    #[test]
    fn rejects_data_outside_source() {
        let source = MemorySource::shared(vec![0u8; 10]);

        assert!(Entry::new(source.clone(), "a", 10, 0).is_ok());
        assert!(matches!(
            Entry::new(source.clone(), "a", 11, 0),
            Err(Error::OutOfRange { field: "offset", .. })
        ));
        assert!(matches!(
            Entry::new(source, "a", 4, 7),
            Err(Error::OutOfRange { field: "length", .. })
        ));
    }

    #[test]
    fn raw_entry_passes_bytes_through() -> Result<()> {
        let source = MemorySource::shared(b"..Hello World..".to_vec());
        let entry = Entry::new(source, "hello.txt", 2, 11)?;

        assert_eq!(entry.strategy_name(), "Default");
        assert_eq!(entry.read_all()?, b"Hello World".to_vec());

        let mut reader = entry.open()?;
        let mut out = Vec::new();
        while reader.available() {
            out.push(reader.read_byte()?);
        }
        assert_eq!(out, b"Hello World".to_vec());
        assert!(matches!(reader.read_byte(), Err(Error::ExhaustedStream)));

        Ok(())
    }

    #[test]
    fn fields_can_be_reassigned_after_peeking() -> Result<()> {
        // a 4 byte size prefix in front of LZSS data
        let source = MemorySource::shared(vec![
            0x03, 0x00, 0x00, 0x00, 0b0000_0111, b'a', b'b', b'c',
        ]);
        let mut entry = Entry::new(source, "unnamed", 0, 8)?;

        let prefix = entry.peek(4)?;
        let size = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

        entry.set_location(4, 4)?;
        entry.set_compression(Arc::new(Lzss), size as u64);
        entry.set_name("named.txt");
        entry.set_property("width", 3);

        assert_eq!(entry.name(), "named.txt");
        assert_eq!(entry.property("width"), Some("3"));
        assert_eq!(entry.decompressed_length(), 3);

        let mut out = String::new();
        entry.open()?.read_to_string(&mut out)?;
        assert_eq!(out, "abc");

        Ok(())
    }

    #[test]
    fn peek_stops_early() -> Result<()> {
        let source = MemorySource::shared(b"DDS \x7c\0\0\0rest of the texture".to_vec());
        let entry = Entry::new(source, "texture", 0, 27)?;

        assert_eq!(entry.peek(4)?, b"DDS ".to_vec());
        assert_eq!(entry.guess_extension()?, Some("dds"));

        Ok(())
    }

    #[test]
    fn read_all_keeps_codec_errors() -> Result<()> {
        let source = MemorySource::shared(vec![0xFF; 16]);
        let entry = Entry::compressed(source, "broken.bin", 0, 16, 64, Arc::new(Zlib))?;

        assert!(matches!(
            entry.read_all(),
            Err(Error::Codec { codec: "ZLib", .. })
        ));

        Ok(())
    }
}
