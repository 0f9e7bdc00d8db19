//! Base types for structure of TRE file.

use crate::compression::CompressionMethod;
use binrw::{BinRead, BinWrite};

/// Size of [`TreHeader`] on disk
pub const HEADER_SIZE: u64 = 36;

/// Size of one [`TreRecord`] on disk
pub const RECORD_SIZE: u64 = 24;

/// Size of one entry of the digest block
pub const DIGEST_SIZE: u64 = 16;

/// TRE file header
///
/// Always starts with the bytes `EERT5000`.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"EERT5000", little)]
pub struct TreHeader {
    /// The number of records stored in the file
    pub records: u32,

    /// The offset from the beginning of the file where the record block starts
    pub record_start: u32,

    /// How the record block is stored
    pub record_compression: CompressionMethod,

    /// The stored size of the record block
    pub record_compressed: u32,

    /// How the name block is stored
    pub name_compression: CompressionMethod,

    /// The stored size of the name block
    pub name_compressed: u32,

    /// The size of the name block once decompressed
    pub name_uncompressed: u32,
}

impl TreHeader {
    /// Where the name block starts
    pub fn name_start(&self) -> u64 {
        self.record_start as u64 + self.record_compressed as u64
    }

    /// Where the digest block starts
    pub fn digest_start(&self) -> u64 {
        self.name_start() + self.name_compressed as u64
    }

    /// Size of the record block once decompressed
    pub fn record_uncompressed(&self) -> u64 {
        self.records as u64 * RECORD_SIZE
    }
}

impl Default for TreHeader {
    fn default() -> Self {
        Self {
            records: 0,
            record_start: HEADER_SIZE as u32,
            record_compression: CompressionMethod::None,
            record_compressed: 0,
            name_compression: CompressionMethod::None,
            name_compressed: 0,
            name_uncompressed: 0,
        }
    }
}

/// One file in the record block
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct TreRecord {
    /// A [`crc::CRC_32_BZIP2`] checksum of the record's name
    pub checksum: u32,

    /// The size of the data for this record before compression
    pub data_uncompressed: u32,

    /// The offset to the data for this record from the start of the file
    pub data_offset: u32,

    /// The compression type used to compress this record's data
    pub data_compression: CompressionMethod,

    /// The size of this record's data after compression
    pub data_compressed: u32,

    /// The offset from the start of the name block for this record's name
    pub name_offset: u32,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use gamearc_core::error::Result;
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionMethod;
    use crate::types::{TreHeader, TreRecord};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x45, 0x45, 0x52, 0x54, 0x35, 0x30, 0x30, 0x30,
            0x03, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x1C, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x21, 0x00, 0x00, 0x00,
            0x21, 0x00, 0x00, 0x00,
        ]);

        let header = TreHeader::read(&mut input)?;
        assert_eq!(
            header,
            TreHeader {
                records: 3,
                record_start: 64,
                record_compression: CompressionMethod::Zlib,
                record_compressed: 28,
                name_compression: CompressionMethod::None,
                name_compressed: 33,
                name_uncompressed: 33,
            }
        );
        assert_eq!(header.name_start(), 92);
        assert_eq!(header.digest_start(), 125);
        assert_eq!(header.record_uncompressed(), 72);

        Ok(())
    }

    #[test]
    fn reject_other_versions() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x45, 0x45, 0x52, 0x54, 0x34, 0x30, 0x30, 0x30,
            0x00, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert!(TreHeader::read(&mut input).is_err());
    }

    #[test]
    fn reject_unknown_compression() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert!(TreRecord::read(&mut input).is_err());
    }

    #[test]
    fn record_layout() -> Result<()> {
        let record = TreRecord {
            checksum: 0xAABBCCDD,
            data_uncompressed: 11,
            data_offset: 36,
            data_compression: CompressionMethod::Zlib,
            data_compressed: 19,
            name_offset: 10,
        };

        let mut bytes = Vec::new();
        record.write(&mut Cursor::new(&mut bytes))?;

        #[rustfmt::skip]
        assert_eq!(bytes, vec![
            0xDD, 0xCC, 0xBB, 0xAA,
            0x0B, 0x00, 0x00, 0x00,
            0x24, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x13, 0x00, 0x00, 0x00,
            0x0A, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(TreRecord::read(&mut Cursor::new(bytes))?, record);

        Ok(())
    }
}
