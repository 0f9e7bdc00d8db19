//! Reading PAK indices into entries

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use byteorder::{ReadBytesExt, LE};
use gamearc_core::{
    archive::read_magic,
    error::{Error, Result},
    BlockExporterWrapper, Entry, FormatPlugin, ParseContext, RangeReader, SharedSource, Zlib,
};
use sha1::{Digest, Sha1};
use tracing::{debug, instrument, trace, warn};

use crate::{
    footer::{Footer, Version, FOOTER_SIZE, MAGIC},
    record::{CompressionMethod, PakRecord, ReadExt},
};

/// Format plugin for PAK archives of versions 1 to 4
///
/// ```no_run
/// use gamearc_core::{Archive, FileSource, ReadOptions};
/// use gamearc_pak::PakFormat;
///
/// fn extract_first(path: &str) -> gamearc_core::error::Result<Vec<u8>> {
///     let pak = Archive::open(FileSource::shared(path)?, &[&PakFormat], ReadOptions::default())?;
///     pak.by_index(0)?.read_all()
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PakFormat;

/// Version found in the footer, if it is one this plugin reads
fn footer_version(source: &SharedSource) -> Result<Option<Version>> {
    let Some(start) = source.len().checked_sub(FOOTER_SIZE) else {
        return Ok(None);
    };
    let Some(bytes) = read_magic::<8>(source, start)? else {
        return Ok(None);
    };

    let mut reader = Cursor::new(bytes);
    if reader.read_u32::<LE>()? != MAGIC {
        return Ok(None);
    }
    Ok(Version::try_from(reader.read_u32::<LE>()?).ok())
}

impl FormatPlugin for PakFormat {
    fn name(&self) -> &'static str {
        "pak"
    }

    fn sniff(&self, source: &SharedSource) -> Result<bool> {
        Ok(footer_version(source)?.is_some())
    }

    #[instrument(skip_all, err)]
    fn read(&self, source: &SharedSource, ctx: &ParseContext) -> Result<Vec<Entry>> {
        let Some(version) = footer_version(source)? else {
            return Err(Error::MalformedHeader("no pak footer found".into()));
        };

        let (start, length) = ctx.check_range(
            ctx.source_length().saturating_sub(version.footer_size()),
            version.footer_size(),
        )?;
        let footer = Footer::read(&mut RangeReader::new(source.clone(), start, length), version)?;
        debug!(?footer, "read footer");

        if footer.encrypted {
            return Err(Error::CustomError(
                "encrypted pak indices are not supported".into(),
            ));
        }

        let index = read_index(source, ctx, &footer)?;
        let mut index = Cursor::new(index);

        let mount_point = index.read_fstring(ctx)?;
        let count = ctx.check_num_files(index.read_u32::<LE>()?)?;
        debug!(mount_point = mount_point.as_str(), count, "read index header");

        (0..count)
            .map(|_| {
                let path = index.read_fstring(ctx)?;
                ctx.check_filename(&path)?;
                let record = PakRecord::read(&mut index, version, ctx)?;
                trace!(path = path.as_str(), ?record, "read record");
                to_entry(source, ctx, version, path, &record)
            })
            .collect()
    }
}

fn read_index(source: &SharedSource, ctx: &ParseContext, footer: &Footer) -> Result<Vec<u8>> {
    let (offset, length) = ctx.check_range(footer.index_offset, footer.index_size)?;

    let mut index = vec![0u8; length as usize];
    source.read_exact_at(offset, &mut index)?;

    let hash = Sha1::digest(&index);
    if hash.as_slice() != footer.hash.as_slice() {
        warn!(
            stored = %hex(&footer.hash),
            computed = %hex(&hash),
            "index hash mismatch"
        );
    }

    Ok(index)
}

fn to_entry(
    source: &SharedSource,
    ctx: &ParseContext,
    version: Version,
    path: String,
    record: &PakRecord,
) -> Result<Entry> {
    if record.is_encrypted() {
        return Err(Error::CustomError(format!(
            "{path} is encrypted, which is not supported"
        )));
    }

    let (offset, length) = ctx.check_range(record.data_offset(version), record.compressed)?;

    let mut entry = match record.compression {
        CompressionMethod::None => {
            if record.uncompressed != length {
                warn!(
                    path = path.as_str(),
                    length,
                    uncompressed = record.uncompressed,
                    "stored file sizes disagree"
                );
            }
            Entry::new(source.clone(), path, offset, length)?
        }
        CompressionMethod::Zlib if ctx.is_implausible(length, record.uncompressed) => {
            warn!(
                path = path.as_str(),
                length,
                uncompressed = record.uncompressed,
                "implausible size, reading as stored"
            );
            Entry::new(source.clone(), path, offset, length)?
        }
        CompressionMethod::Zlib if record.blocks.is_empty() => Entry::compressed(
            source.clone(),
            path,
            offset,
            length,
            record.uncompressed,
            Arc::new(Zlib),
        )?,
        CompressionMethod::Zlib => {
            let wrapper = BlockExporterWrapper::new(Arc::new(Zlib), record.block_table(ctx)?);
            let mut entry = Entry::compressed(
                source.clone(),
                path,
                offset,
                length,
                record.uncompressed,
                Arc::new(wrapper),
            )?;
            entry.set_property("blocks", record.blocks.len());
            entry.set_property("block_size", record.block_size);
            entry
        }
        CompressionMethod::Unsupported(method) => {
            return Err(Error::CustomError(format!(
                "{path} uses compression method {method}, which is not supported"
            )));
        }
    };

    entry.set_property("sha1", hex(&record.hash));
    if let Some(timestamp) = record.timestamp {
        entry.set_property("timestamp", timestamp);
    }
    Ok(entry)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check an entry's stored data against its `sha1` property
///
/// Returns `None` when the entry carries no hash.
#[instrument(skip_all, fields(name = entry.name()), err)]
pub fn verify_sha1(entry: &Entry) -> Result<Option<bool>> {
    let Some(expected) = entry.property("sha1") else {
        return Ok(None);
    };

    let mut reader = RangeReader::new(entry.source().clone(), entry.offset(), entry.length());
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(Some(hex(&hasher.finalize()) == expected))
}
