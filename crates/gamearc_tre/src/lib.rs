//! A **gamearc** format plugin for the **TRE** archives used by *Star Wars Galaxies*.
//!
//! # TRE v5 layout
//!
//! All integers are little-endian `u32`s. The file opens with a fixed 36 byte header, followed by
//! the file data, the record block, the name block and finally an MD5 digest per record.
//!
//! | Offset (bytes) | Field                  | Description                                            |
//! |----------------|------------------------|--------------------------------------------------------|
//! | 0x0000         | Magic                  | 8 bytes: `EERT5000`, "TREE" and version "0005" reversed |
//! | 0x0008         | Record Count           | Number of files in the archive                         |
//! | 0x000C         | Record Offset          | Where the record block starts                          |
//! | 0x0010         | Record Compression     | `0` stored, `2` zlib                                   |
//! | 0x0014         | Record Size            | Size of the record block as stored                     |
//! | 0x0018         | Name Compression       | `0` stored, `2` zlib                                   |
//! | 0x001C         | Name Size              | Size of the name block as stored                       |
//! | 0x0020         | Name Uncompressed Size | Size of the name block once decompressed               |
//!
//! The name block directly follows the record block. Once decompressed the record block holds
//! one 24 byte record per file:
//!
//! | Offset (bytes) | Field                  | Description                                            |
//! |----------------|------------------------|--------------------------------------------------------|
//! | 0x0000         | Checksum               | CRC-32/BZIP2 of the file's name                        |
//! | 0x0004         | Uncompressed Size      | Size of the file once decompressed                     |
//! | 0x0008         | Data Offset            | Where the file's data starts                           |
//! | 0x000C         | Compression            | `0` stored, `2` zlib                                   |
//! | 0x0010         | Compressed Size        | Size of the file's data as stored                      |
//! | 0x0014         | Name Offset            | Start of the file's name within the name block         |
//!
//! Names are NUL terminated. The digest block is never compressed and holds the MD5 of each file's
//! data as stored, in record order. Older tools omit it.
//!
//! Every record becomes a [`gamearc_core::Entry`] carrying the `crc32` and, when present, `md5`
//! properties.

pub mod compression;
pub mod read;
pub mod types;

pub use compression::CompressionMethod;
pub use read::{verify_md5, TreFormat};
