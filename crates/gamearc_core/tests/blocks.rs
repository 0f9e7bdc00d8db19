use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flate2::{write::ZlibEncoder, Compression};
use gamearc_core::error::{Error, Result};
use gamearc_core::{
    Block, BlockExporterWrapper, BlockVariableExporterWrapper, DecompressedStream,
    DecompressionStrategy, Entry, MemorySource, SharedSource, SharedStrategy, Stored,
    VariableBlock, Zlib,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

/// Stored data whose bytes are inverted, counting how often it is opened
#[derive(Debug, Default)]
struct Inverted {
    opened: AtomicUsize,
}

struct InvertedStream {
    source: SharedSource,
    position: u64,
    end: u64,
}

impl DecompressionStrategy for Inverted {
    fn name(&self) -> &'static str {
        "Inverted"
    }

    fn open(
        &self,
        source: &SharedSource,
        offset: u64,
        compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        assert!(decompressed_length > 0, "opened an empty block");
        assert_eq!(compressed_length, decompressed_length);

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InvertedStream {
            source: source.clone(),
            position: offset,
            end: offset + compressed_length,
        }))
    }
}

impl DecompressedStream for InvertedStream {
    fn available(&self) -> bool {
        self.position < self.end
    }

    fn read_byte(&mut self) -> Result<u8> {
        if !self.available() {
            return Err(Error::ExhaustedStream);
        }
        let mut byte = [0u8; 1];
        self.source.read_exact_at(self.position, &mut byte)?;
        self.position += 1;
        Ok(!byte[0])
    }

    fn produced(&self) -> u64 {
        0
    }
}

fn zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn drain(entry: &Entry) -> Result<Vec<u8>> {
    let mut reader = entry.open()?;
    let mut out = Vec::new();
    while reader.available() {
        out.push(reader.read_byte()?);
    }
    Ok(out)
}

/// Lay out `blocks` back to back, returning the source and their ranges
fn concat(blocks: &[&[u8]]) -> (SharedSource, Vec<(u64, u64)>) {
    let mut data = Vec::new();
    let mut ranges = Vec::new();
    for block in blocks {
        ranges.push((data.len() as u64, block.len() as u64));
        data.extend_from_slice(block);
    }
    (MemorySource::shared(data), ranges)
}

fn entry_for(source: SharedSource, strategy: SharedStrategy, decompressed: u64) -> Result<Entry> {
    let length = source.len();
    Entry::compressed(source, "blocks", 0, length, decompressed, strategy)
}

#[traced_test]
#[test]
fn two_stored_blocks_read_in_order() -> Result<()> {
    let (source, ranges) = concat(&[&[1, 2, 3, 4, 5, 6], &[7, 8, 9, 10]]);
    let blocks = ranges
        .iter()
        .map(|&(offset, length)| Block::stored(offset, length))
        .collect::<Vec<_>>();
    let wrapper = BlockExporterWrapper::new(Arc::new(Stored), blocks);
    let entry = entry_for(source, Arc::new(wrapper), 10)?;

    let mut reader = entry.open()?;
    let mut out = Vec::new();
    for _ in 0..10 {
        assert!(reader.available());
        out.push(reader.read_byte()?);
    }

    assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert!(!reader.available());
    assert!(matches!(reader.read_byte(), Err(Error::ExhaustedStream)));

    Ok(())
}

#[traced_test]
#[test]
fn zlib_blocks_concatenate_in_order() -> Result<()> {
    let parts: [&[u8]; 3] = [b"The quick brown ", b"fox jumps over ", b"the lazy dog"];
    let compressed = parts.iter().map(|p| zlib(p)).collect::<Result<Vec<_>>>()?;
    let (source, ranges) = concat(&compressed.iter().map(Vec::as_slice).collect::<Vec<_>>());

    let offsets = ranges.iter().map(|r| r.0).collect::<Vec<_>>();
    let compressed_lengths = ranges.iter().map(|r| r.1).collect::<Vec<_>>();
    let decompressed_lengths = parts.iter().map(|p| p.len() as u64).collect::<Vec<_>>();
    let total = decompressed_lengths.iter().sum();

    let wrapper = BlockExporterWrapper::from_tables(
        Arc::new(Zlib),
        &offsets,
        &compressed_lengths,
        &decompressed_lengths,
    )?;
    let entry = entry_for(source, Arc::new(wrapper), total)?;

    let expected = parts.concat();
    assert_eq!(drain(&entry)?, expected);

    let mut bulk = Vec::new();
    entry.open()?.read_to_end(&mut bulk)?;
    assert_eq!(bulk, expected);

    Ok(())
}

#[test]
fn byte_count_matches_declared_total() -> Result<()> {
    let (source, ranges) = concat(&[&[1; 7], &[2; 1], &[3; 300]]);
    let blocks = ranges
        .iter()
        .map(|&(offset, length)| Block::stored(offset, length))
        .collect::<Vec<_>>();
    let wrapper = BlockExporterWrapper::new(Arc::new(Stored), blocks);
    let total = wrapper.decompressed_length();
    let entry = entry_for(source, Arc::new(wrapper), total)?;

    let mut reader = entry.open()?;
    let mut count = 0u64;
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf)? {
            0 => break,
            n => count += n as u64,
        }
    }

    assert_eq!(count, 308);
    assert_eq!(reader.position(), 308);
    assert!(!reader.available());

    Ok(())
}

#[test]
fn empty_blocks_are_never_opened() -> Result<()> {
    let (source, ranges) = concat(&[&[0xFE, 0xFD], &[], &[0xFC], &[]]);
    let inverted = Arc::new(Inverted::default());
    let blocks = ranges
        .iter()
        .map(|&(offset, length)| Block::stored(offset, length))
        .collect::<Vec<_>>();
    let wrapper = BlockExporterWrapper::new(inverted.clone(), blocks);
    let entry = entry_for(source, Arc::new(wrapper), 3)?;

    assert_eq!(drain(&entry)?, vec![1, 2, 3]);
    assert_eq!(inverted.opened.load(Ordering::SeqCst), 2);

    Ok(())
}

#[test]
fn only_empty_blocks_produce_nothing() -> Result<()> {
    let source = MemorySource::shared(Vec::new());
    let inverted = Arc::new(Inverted::default());
    let wrapper = BlockExporterWrapper::new(
        inverted.clone(),
        vec![Block::stored(0, 0), Block::stored(0, 0)],
    );
    let entry = entry_for(source, Arc::new(wrapper), 0)?;

    let mut reader = entry.open()?;
    assert!(!reader.available());
    assert!(matches!(reader.read_byte(), Err(Error::ExhaustedStream)));
    assert_eq!(inverted.opened.load(Ordering::SeqCst), 0);

    Ok(())
}

#[test]
fn blocks_open_lazily() -> Result<()> {
    let (source, ranges) = concat(&[&[0xFE], &[0xFD]]);
    let inverted = Arc::new(Inverted::default());
    let blocks = ranges
        .iter()
        .map(|&(offset, length)| Block::stored(offset, length))
        .collect::<Vec<_>>();
    let wrapper = BlockExporterWrapper::new(inverted.clone(), blocks);
    let entry = entry_for(source, Arc::new(wrapper), 2)?;

    let mut reader = entry.open()?;
    assert_eq!(inverted.opened.load(Ordering::SeqCst), 0);
    assert_eq!(reader.read_byte()?, 1);
    assert_eq!(inverted.opened.load(Ordering::SeqCst), 1);
    assert_eq!(reader.read_byte()?, 2);
    assert_eq!(inverted.opened.load(Ordering::SeqCst), 2);

    Ok(())
}

#[traced_test]
#[test]
fn mixed_strategies_interleave() -> Result<()> {
    let first = zlib(b"compressed")?;
    let (source, ranges) = concat(&[b"raw-", &first[..], &[!b'-', !b'o', !b'k'], b"!"]);
    let inverted: SharedStrategy = Arc::new(Inverted::default());
    let stored: SharedStrategy = Arc::new(Stored);
    let zlib: SharedStrategy = Arc::new(Zlib);

    let wrapper = BlockVariableExporterWrapper::new([
        VariableBlock {
            block: Block::stored(ranges[0].0, ranges[0].1),
            strategy: stored.clone(),
        },
        VariableBlock {
            block: Block::new(ranges[1].0, ranges[1].1, 10),
            strategy: zlib,
        },
        VariableBlock {
            block: Block::stored(ranges[2].0, ranges[2].1),
            strategy: inverted,
        },
        VariableBlock {
            block: Block::stored(ranges[3].0, ranges[3].1),
            strategy: stored,
        },
    ]);
    assert_eq!(wrapper.decompressed_length(), 18);

    let entry = entry_for(source, Arc::new(wrapper), 18)?;
    assert_eq!(drain(&entry)?, b"raw-compressed-ok!".to_vec());

    Ok(())
}

#[test]
fn variable_tables_must_match() {
    let stored: SharedStrategy = Arc::new(Stored);
    let result = BlockVariableExporterWrapper::from_tables(
        &[0, 4],
        &[4, 4],
        &[4, 4],
        &[stored],
    );

    assert!(matches!(result, Err(Error::MalformedHeader(_))));
}

#[test]
fn fixed_tables_must_match() {
    let result = BlockExporterWrapper::from_tables(Arc::new(Stored), &[0, 4], &[4], &[4, 4]);

    assert!(matches!(result, Err(Error::MalformedHeader(_))));
}

#[test]
fn declared_total_must_match_entry() -> Result<()> {
    let (source, _) = concat(&[&[1, 2, 3, 4]]);
    let wrapper = BlockExporterWrapper::new(Arc::new(Stored), vec![Block::stored(0, 4)]);
    let entry = entry_for(source, Arc::new(wrapper), 5)?;

    assert!(matches!(entry.open(), Err(Error::MalformedHeader(_))));

    Ok(())
}

#[test]
fn codec_errors_pass_through_unchanged() -> Result<()> {
    let good = zlib(b"fine")?;
    let (source, ranges) = concat(&[&good, &[0xFF; 8]]);
    let wrapper = BlockExporterWrapper::from_tables(
        Arc::new(Zlib),
        &[ranges[0].0, ranges[1].0],
        &[ranges[0].1, ranges[1].1],
        &[4, 4],
    )?;
    let entry = entry_for(source, Arc::new(wrapper), 8)?;

    let mut reader = entry.open()?;
    for expected in b"fine" {
        assert_eq!(reader.read_byte()?, *expected);
    }
    assert!(matches!(
        reader.read_byte(),
        Err(Error::Codec { codec: "ZLib", .. })
    ));

    Ok(())
}

#[test]
fn short_blocks_are_codec_errors() -> Result<()> {
    let (source, _) = concat(&[&[1, 2, 3]]);
    let wrapper = BlockVariableExporterWrapper::new([VariableBlock {
        block: Block::new(0, 3, 4),
        strategy: Arc::new(Stored),
    }]);
    let entry = entry_for(source, Arc::new(wrapper), 4)?;

    let mut reader = entry.open()?;
    for expected in [1, 2, 3] {
        assert_eq!(reader.read_byte()?, expected);
    }
    assert!(matches!(reader.read_byte(), Err(Error::Codec { .. })));

    Ok(())
}

#[test]
fn independent_readers_share_a_source() -> Result<()> {
    let (source, ranges) = concat(&[b"abc", b"def"]);
    let blocks = ranges
        .iter()
        .map(|&(offset, length)| Block::stored(offset, length))
        .collect::<Vec<_>>();
    let wrapper = BlockExporterWrapper::new(Arc::new(Stored), blocks);
    let entry = entry_for(source, Arc::new(wrapper), 6)?;

    let mut first = entry.open()?;
    let mut second = entry.open()?;
    assert_eq!(first.read_byte()?, b'a');
    assert_eq!(first.read_byte()?, b'b');
    assert_eq!(second.read_byte()?, b'a');
    assert_eq!(first.read_byte()?, b'c');
    assert_eq!(first.read_byte()?, b'd');
    assert_eq!(second.read_byte()?, b'b');

    Ok(())
}

#[test]
fn cut_off_zlib_blocks_are_codec_errors() -> Result<()> {
    let data: Vec<u8> = (0..200u32).map(|i| (i * 13 % 256) as u8).collect();
    let compressed = zlib(&data)?;
    let half = &compressed[..compressed.len() / 2];

    let (source, ranges) = concat(&[half]);
    let wrapper = BlockExporterWrapper::new(
        Arc::new(Zlib),
        vec![Block::new(ranges[0].0, ranges[0].1, 200)],
    );
    let entry = entry_for(source, Arc::new(wrapper), 200)?;

    assert!(matches!(
        drain(&entry),
        Err(Error::Codec { codec: "ZLib", .. })
    ));
    assert!(matches!(
        entry.read_all(),
        Err(Error::Codec { codec: "ZLib", .. })
    ));

    Ok(())
}

#[test]
fn variable_tables_build_a_stream() -> Result<()> {
    let packed = zlib(b"packed")?;
    let (source, ranges) = concat(&[&packed[..], b"+plain"]);
    let strategies: [SharedStrategy; 2] = [Arc::new(Zlib), Arc::new(Stored)];

    let wrapper = BlockVariableExporterWrapper::from_tables(
        &[ranges[0].0, ranges[1].0],
        &[ranges[0].1, ranges[1].1],
        &[6, 6],
        &strategies,
    )?;
    assert_eq!(wrapper.strategy(1).map(|s| s.name()), Some("Default"));
    let entry = entry_for(source, Arc::new(wrapper), 12)?;

    let mut reader = entry.open()?;
    let mut out = Vec::new();
    while reader.available() {
        out.push(reader.read_byte()?);
    }

    assert_eq!(out, b"packed+plain".to_vec());
    assert_eq!(reader.position(), 12);
    assert!(matches!(reader.read_byte(), Err(Error::ExhaustedStream)));
    assert!(matches!(reader.read_byte(), Err(Error::ExhaustedStream)));

    Ok(())
}
