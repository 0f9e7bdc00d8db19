//! This library holds the parts shared by every **gamearc** format plugin: the [`Entry`] record
//! describing one file inside a game archive, the [`DecompressionStrategy`] capability entries
//! are decompressed through, and the block wrappers which stitch chunked data back together.
//!
//! # Reading model
//!
//! A format plugin parses an archive's directory and produces one [`Entry`] per file:
//!
//! | Field                 | Description                                                    |
//! |-----------------------|----------------------------------------------------------------|
//! | Source                | Shared handle to the bytes of the archive                      |
//! | Name                  | Output name, may be reassigned once a name table is resolved   |
//! | Offset                | Where the entry's data starts within the source                |
//! | Length                | Size of the data as stored, possibly compressed                |
//! | Decompressed Length   | Size of the data once decompressed, equal to Length if stored  |
//! | Strategy              | Optional [`DecompressionStrategy`], raw passthrough if absent  |
//! | Properties            | Ordered string metadata the core does not interpret            |
//!
//! Reading is demand driven. [`Entry::open`] returns an [`EntryReader`] and no byte is read from
//! the source or decompressed until the reader is pulled from, one byte at a time through
//! [`EntryReader::read_byte`] or in bulk through [`std::io::Read`].
//!
//! ## Blocks
//!
//! Many formats compress large files in chunks. Each chunk is described by a [`Block`] and a
//! table of blocks is wrapped in either
//!
//! - [`BlockExporterWrapper`]: every block uses the same strategy, or
//! - [`BlockVariableExporterWrapper`]: every block names its own strategy, which lets chunks that
//!   did not shrink be stored raw next to compressed ones.
//!
//! The wrappers are strategies themselves. They open blocks lazily in index order, drain each one
//! completely before the next, and never open a block that decompresses to nothing.
//!
//! ## Validation
//!
//! Directory values are untrusted. The helpers in [`validate`] bound every count, offset, length
//! and filename before it is used and fail with one shared [`error::Error`] type, so a corrupt
//! directory aborts its own read instead of causing huge allocations.
//!
//! ## Bundled strategies
//!
//! - [`Stored`]: the data as-is (named `"Default"`)
//! - [`Zlib`] and [`Deflate`]: via `flate2`
//! - [`Lzss`]: the 4 KiB window LZSS used by a large number of games
//!

pub mod archive;
pub mod block;
pub mod entry;
pub mod error;
pub mod ext;
pub mod source;
pub mod strategy;
pub mod validate;

pub use archive::{Archive, FormatPlugin};
pub use block::{Block, BlockExporterWrapper, BlockVariableExporterWrapper, VariableBlock};
pub use entry::{Entry, EntryReader};
pub use source::{ByteSource, FileSource, MemorySource, RangeReader, SharedSource};
pub use strategy::{
    Deflate, DecompressedStream, DecompressionStrategy, Lzss, SharedStrategy, Stored, Zlib,
};
pub use validate::{Limits, ParseContext, ReadOptions, StubPolicy};
