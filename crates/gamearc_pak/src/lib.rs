//! A **gamearc** format plugin for the PAK archives written by early versions of Unreal Engine 4.
//!
//! Only the layouts up to version 4 are understood. Later versions moved block offsets, added
//! encryption key GUIDs and named compression methods, and are rejected by [`PakFormat::sniff`].
//!
//! # Layout
//!
//! All integers are little-endian. A PAK is read from its end: a fixed footer points at the
//! index, which in turn points at the data of every file.
//!
//! ## Footer
//!
//! | Size (bytes) | Field           | Description                                         |
//! |--------------|-----------------|-----------------------------------------------------|
//! | 1            | Encrypted Index | Version 4 only, a non-zero value is not supported   |
//! | 4            | Magic           | `0x5A6F12E1`                                        |
//! | 4            | Version         | `1` to `4`                                          |
//! | 8            | Index Offset    | Where the index starts                              |
//! | 8            | Index Size      | Size of the index                                   |
//! | 20           | Index Hash      | SHA-1 of the index                                  |
//!
//! ## Index
//!
//! A mount point string and a `u32` file count, followed by a path string and a record per
//! file. Strings are a signed `i32` length including the NUL terminator, UTF-8 when positive,
//! UTF-16 when negative.
//!
//! | Size (bytes) | Field             | Description                                        |
//! |--------------|-------------------|----------------------------------------------------|
//! | 8            | Offset            | Where this file's copy of its record starts        |
//! | 8            | Compressed Size   | Size of the data as stored                         |
//! | 8            | Uncompressed Size | Size of the data once decompressed                 |
//! | 4            | Compression       | `0` stored, `1` zlib                               |
//! | 8            | Timestamp         | Version 1 only                                     |
//! | 20           | Hash              | SHA-1 of the data as stored                        |
//! | 4 + 16 × n   | Blocks            | Version 3+, compressed files only: absolute `(start, end)` pairs |
//! | 1            | Flags             | Version 3+, bit 0 marks encrypted data             |
//! | 4            | Block Size        | Version 3+, uncompressed size of each block        |
//!
//! The data of a file is preceded by a second copy of its record. Compressed files from
//! version 3 onward are cut into zlib blocks of `Block Size` bytes before compression, which
//! this crate reads through a [`gamearc_core::BlockExporterWrapper`].

pub mod footer;
pub mod read;
pub mod record;

pub use footer::{Footer, Version};
pub use read::{verify_sha1, PakFormat};
pub use record::PakRecord;
