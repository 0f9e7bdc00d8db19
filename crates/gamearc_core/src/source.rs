//! Bounded, random-access inputs that entries read their data from.

use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::instrument;

use crate::error::Result;

/// A seekable, bounded binary input.
///
/// Reads are position-explicit so any number of entry streams can pull from the same source
/// without sharing a cursor.
pub trait ByteSource: Debug + Send + Sync {
    /// Total number of bytes in the source
    fn len(&self) -> u64;

    /// Whether the source contains no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes starting at `offset`, returning how many were read.
    ///
    /// Returns `Ok(0)` once `offset` reaches [`ByteSource::len`].
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Fill `buf` completely starting at `offset`
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Reference-counted handle to a [`ByteSource`], shared between an archive and its entries
pub type SharedSource = Arc<dyn ByteSource>;

/// A source backed by a buffer held in memory
#[derive(Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    /// Wrap the given bytes
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Wrap the given bytes and return a handle ready to hand to a plugin
    pub fn shared(data: impl Into<Arc<[u8]>>) -> SharedSource {
        Arc::new(Self::new(data))
    }
}

impl Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemorySource({} bytes)", self.data.len())
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        let Some(available) = self.data.get(start..) else {
            return Ok(0);
        };

        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        Ok(count)
    }
}

/// A source backed by a file on disk
///
/// Reads are positional on unix. Elsewhere seek-and-read pairs are serialized behind a lock.
pub struct FileSource {
    path: PathBuf,
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: std::sync::Mutex<File>,
    len: u64,
}

impl FileSource {
    /// Open the file at `path`
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: file.into(),
            len,
        })
    }

    /// Open the file at `path` and return a handle ready to hand to a plugin
    pub fn shared(path: impl AsRef<Path>) -> Result<SharedSource> {
        Ok(Arc::new(Self::open(path)?))
    }

    /// Path the source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSource({}, {} bytes)", self.path.display(), self.len)
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        let limit = (self.len - offset).min(buf.len() as u64) as usize;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(&mut buf[..limit], offset)
        }

        #[cfg(not(unix))]
        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "file source lock poisoned"))?;
            file.seek(SeekFrom::Start(offset))?;
            file.read(&mut buf[..limit])
        }
    }
}

/// A [`Read`] + [`Seek`] view over `[start, end)` of a [`SharedSource`].
///
/// Seek positions are relative to `start`, which lets format parsers use `binrw` and
/// `byteorder` on a region as though it were a standalone file.
#[derive(Debug, Clone)]
pub struct RangeReader {
    source: SharedSource,
    start: u64,
    end: u64,
    position: u64,
}

impl RangeReader {
    /// View `length` bytes of `source` starting at `offset`, clamped to the source's end
    pub fn new(source: SharedSource, offset: u64, length: u64) -> Self {
        let end = offset.saturating_add(length).min(source.len());
        let start = offset.min(end);
        Self {
            source,
            start,
            end,
            position: start,
        }
    }

    /// View the whole of `source`
    pub fn whole(source: SharedSource) -> Self {
        let len = source.len();
        Self::new(source, 0, len)
    }

    /// Bytes left between the current position and the end of the range
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.remaining().min(buf.len() as u64) as usize;
        if limit == 0 {
            return Ok(0);
        }

        let read = self.source.read_at(self.position, &mut buf[..limit])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => self.start.checked_add(n),
            SeekFrom::End(n) => self.end.checked_add_signed(n),
            SeekFrom::Current(n) => self.position.checked_add_signed(n),
        };

        match target {
            Some(target) if target >= self.start => {
                self.position = target;
                Ok(target - self.start)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
