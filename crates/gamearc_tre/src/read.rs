//! Reading TRE directories into entries

use std::io::{Cursor, Read};

use binrw::BinRead;
use gamearc_core::{
    archive::read_magic,
    error::{Error, Result},
    Entry, FormatPlugin, ParseContext, RangeReader, SharedSource,
};
use md5::{Digest, Md5};
use tracing::{debug, instrument, warn};

use crate::{
    compression::{read_block, CompressionMethod},
    types::{TreHeader, TreRecord, DIGEST_SIZE, HEADER_SIZE},
};

const MAGIC: &[u8; 8] = b"EERT5000";

const NAME_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_BZIP2);

/// Format plugin for TRE v5 archives
///
/// ```no_run
/// use gamearc_core::{Archive, FileSource, ReadOptions};
/// use gamearc_tre::TreFormat;
///
/// fn list_tre_contents(path: &str) -> gamearc_core::error::Result<()> {
///     let tre = Archive::open(FileSource::shared(path)?, &[&TreFormat], ReadOptions::default())?;
///
///     for entry in tre.entries() {
///         println!("{} ({})", entry.name(), entry.property("crc32").unwrap_or("-"));
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TreFormat;

impl FormatPlugin for TreFormat {
    fn name(&self) -> &'static str {
        "tre"
    }

    fn sniff(&self, source: &SharedSource) -> Result<bool> {
        Ok(read_magic::<8>(source, 0)?.is_some_and(|magic| &magic == MAGIC))
    }

    #[instrument(skip_all, err)]
    fn read(&self, source: &SharedSource, ctx: &ParseContext) -> Result<Vec<Entry>> {
        let header = read_header(source, ctx)?;
        let records = get_records(source, ctx, &header)?;
        let names = get_names(source, ctx, &header)?;
        let digests = get_digests(source, &header)?;

        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let name = name_at(ctx, &names, record.name_offset)?;
                let mut entry = to_entry(source, ctx, record, name)?;
                if let Some(digest) = digests.as_ref().and_then(|d| d.get(index)) {
                    entry.set_property("md5", hex(digest));
                }
                Ok(entry)
            })
            .collect()
    }
}

fn read_header(source: &SharedSource, ctx: &ParseContext) -> Result<TreHeader> {
    ctx.check_range(0u64, HEADER_SIZE)?;
    let mut bytes = [0u8; HEADER_SIZE as usize];
    source.read_exact_at(0, &mut bytes)?;

    let header = TreHeader::read(&mut Cursor::new(bytes))?;
    debug!(?header, "read header");
    Ok(header)
}

fn get_records(
    source: &SharedSource,
    ctx: &ParseContext,
    header: &TreHeader,
) -> Result<Vec<TreRecord>> {
    let count = ctx.check_num_files(header.records)?;
    let (start, stored) = ctx.check_range(header.record_start, header.record_compressed)?;

    let expected = header.record_uncompressed();
    if header.record_compression == CompressionMethod::None && stored < expected {
        return Err(Error::MalformedHeader(format!(
            "record block of {stored} bytes cannot hold {count} records"
        )));
    }

    let block = read_block(source, start, stored, expected, header.record_compression)?;
    let mut reader = Cursor::new(block);

    (0..count)
        .map(|_| TreRecord::read(&mut reader).map_err(Error::from))
        .collect()
}

fn get_names(source: &SharedSource, ctx: &ParseContext, header: &TreHeader) -> Result<Vec<u8>> {
    let (start, stored) = ctx.check_range(header.name_start(), header.name_compressed)?;

    let limits = ctx.options().limits;
    let ceiling = (header.records as u64)
        .saturating_mul(limits.max_filename_length.saturating_add(1));
    let uncompressed = match header.name_compression {
        CompressionMethod::None => stored,
        CompressionMethod::Zlib => {
            gamearc_core::validate::check_length(header.name_uncompressed, ceiling)?
        }
    };

    read_block(source, start, stored, uncompressed, header.name_compression)
}

/// The digest block is optional, only read it when it is all there
fn get_digests(source: &SharedSource, header: &TreHeader) -> Result<Option<Vec<[u8; 16]>>> {
    let start = header.digest_start();
    let length = header.records as u64 * DIGEST_SIZE;
    if start.saturating_add(length) > source.len() {
        debug!(start, length, "no digest block");
        return Ok(None);
    }

    let mut reader = RangeReader::new(source.clone(), start, length);
    let digests = (0..header.records)
        .map(|_| {
            let mut digest = [0u8; DIGEST_SIZE as usize];
            reader.read_exact(&mut digest)?;
            Ok(digest)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(digests))
}

fn name_at(ctx: &ParseContext, names: &[u8], offset: u32) -> Result<String> {
    let start = gamearc_core::validate::check_offset(offset, names.len() as u64)? as usize;

    let Some(length) = names[start..].iter().position(|&c| c == b'\0') else {
        return Err(Error::MalformedHeader(format!(
            "name at {start} is not terminated"
        )));
    };
    ctx.check_filename_length(length)?;

    let name = String::from_utf8_lossy(&names[start..start + length]);
    Ok(ctx.check_filename(&name)?.to_owned())
}

fn to_entry(
    source: &SharedSource,
    ctx: &ParseContext,
    record: &TreRecord,
    name: String,
) -> Result<Entry> {
    let checksum = NAME_CRC.checksum(name.as_bytes());
    if checksum != record.checksum {
        warn!(
            name = name.as_str(),
            stored = record.checksum,
            computed = checksum,
            "name checksum mismatch"
        );
    }

    let (offset, length) = ctx.check_range(record.data_offset, record.data_compressed)?;
    let decompressed = record.data_uncompressed as u64;

    let mut entry = match record.data_compression {
        CompressionMethod::Zlib if ctx.is_implausible(length, decompressed) => {
            warn!(
                name = name.as_str(),
                length,
                decompressed,
                "implausible size, reading as stored"
            );
            Entry::new(source.clone(), name, offset, length)?
        }
        CompressionMethod::Zlib => Entry::compressed(
            source.clone(),
            name,
            offset,
            length,
            decompressed,
            CompressionMethod::Zlib.strategy(),
        )?,
        CompressionMethod::None => {
            if length != decompressed {
                warn!(
                    name = name.as_str(),
                    length,
                    decompressed,
                    "stored file sizes disagree"
                );
            }
            Entry::new(source.clone(), name, offset, length)?
        }
    };

    entry.set_property("crc32", format!("{:08x}", record.checksum));
    Ok(entry)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check an entry's stored data against its `md5` property
///
/// Returns `None` when the archive carried no digest for the entry.
#[instrument(skip_all, fields(name = entry.name()), err)]
pub fn verify_md5(entry: &Entry) -> Result<Option<bool>> {
    let Some(expected) = entry.property("md5") else {
        return Ok(None);
    };

    let mut reader = RangeReader::new(entry.source().clone(), entry.offset(), entry.length());
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(Some(hex(&hasher.finalize()) == expected))
}
