//! Wrappers presenting several discontiguous compressed blocks as one decompressed stream.
//!
//! Formats which compress a file in chunks record a table of `(offset, compressed length,
//! decompressed length)` triples per entry. [`BlockExporterWrapper`] decompresses every block with
//! the same strategy, while [`BlockVariableExporterWrapper`] carries a strategy per block so that
//! chunks which failed to shrink can be stored raw alongside compressed ones.
//!
//! Both wrappers are themselves [`DecompressionStrategy`] implementations and are assigned to an
//! [`crate::entry::Entry`] like any other codec. Blocks are opened lazily, drained fully in index
//! order and closed before the next one is opened. Blocks with no output are never opened.

use std::sync::Arc;

use tracing::{instrument, trace};

use crate::{
    error::{Error, Result},
    source::SharedSource,
    strategy::{DecompressedStream, DecompressionStrategy, SharedStrategy},
};

/// One contiguous compressed range of an entry's data
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Start of the compressed data within the source
    pub offset: u64,

    /// Size of the compressed data
    pub compressed_length: u64,

    /// Number of bytes the block decompresses to
    pub decompressed_length: u64,
}

impl Block {
    /// Describe a block
    pub fn new(offset: u64, compressed_length: u64, decompressed_length: u64) -> Self {
        Self {
            offset,
            compressed_length,
            decompressed_length,
        }
    }

    /// Describe a block whose data is stored as-is
    pub fn stored(offset: u64, length: u64) -> Self {
        Self::new(offset, length, length)
    }
}

/// Build a block table for formats which cut the input into chunks of `block_size` bytes before
/// compressing each one.
///
/// Every block decompresses to `block_size` bytes except the last, which holds the remainder of
/// `decompressed_length`. `ranges` are the `(offset, compressed length)` pairs read from the
/// directory.
pub fn fixed_size_blocks(
    block_size: u64,
    decompressed_length: u64,
    ranges: impl IntoIterator<Item = (u64, u64)>,
) -> Result<Vec<Block>> {
    if block_size == 0 && decompressed_length > 0 {
        return Err(Error::MalformedHeader(
            "compression block size of 0 for a non-empty entry".into(),
        ));
    }

    let mut remaining = decompressed_length;
    let blocks = ranges
        .into_iter()
        .map(|(offset, compressed_length)| {
            let size = remaining.min(block_size);
            remaining -= size;
            Block::new(offset, compressed_length, size)
        })
        .collect::<Vec<_>>();

    if remaining > 0 {
        return Err(Error::MalformedHeader(format!(
            "{} blocks of {} bytes cannot hold {} bytes",
            blocks.len(),
            block_size,
            decompressed_length
        )));
    }

    Ok(blocks)
}

fn check_tables(names: &str, lengths: &[usize]) -> Result<()> {
    if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
        return Err(Error::MalformedHeader(format!(
            "block tables ({names}) have mismatched lengths {lengths:?}"
        )));
    }
    Ok(())
}

fn check_total(blocks: &[Block], expected: u64) -> Result<()> {
    let total = blocks
        .iter()
        .try_fold(0u64, |acc, b| acc.checked_add(b.decompressed_length));

    match total {
        Some(total) if total == expected => Ok(()),
        Some(total) => Err(Error::MalformedHeader(format!(
            "blocks decompress to {total} bytes but the entry expects {expected}"
        ))),
        None => Err(Error::MalformedHeader(
            "block sizes overflow a 64-bit length".into(),
        )),
    }
}

/// Blocks that all share one decompression strategy
#[derive(Debug, Clone)]
pub struct BlockExporterWrapper {
    strategy: SharedStrategy,
    blocks: Arc<[Block]>,
}

impl BlockExporterWrapper {
    /// Wrap `blocks`, each decompressed by `strategy`
    pub fn new(strategy: SharedStrategy, blocks: impl Into<Arc<[Block]>>) -> Self {
        Self {
            strategy,
            blocks: blocks.into(),
        }
    }

    /// Build from the parallel offset and length tables found in directories
    pub fn from_tables(
        strategy: SharedStrategy,
        offsets: &[u64],
        compressed_lengths: &[u64],
        decompressed_lengths: &[u64],
    ) -> Result<Self> {
        check_tables(
            "offset, compressed, decompressed",
            &[
                offsets.len(),
                compressed_lengths.len(),
                decompressed_lengths.len(),
            ],
        )?;

        let blocks = offsets
            .iter()
            .zip(compressed_lengths)
            .zip(decompressed_lengths)
            .map(|((&o, &c), &d)| Block::new(o, c, d))
            .collect::<Vec<_>>();

        Ok(Self::new(strategy, blocks))
    }

    /// The strategy used for every block
    pub fn strategy(&self) -> &SharedStrategy {
        &self.strategy
    }

    /// The block table
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Sum of the compressed block sizes
    pub fn compressed_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.compressed_length).sum()
    }

    /// Sum of the decompressed block sizes
    pub fn decompressed_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.decompressed_length).sum()
    }
}

impl DecompressionStrategy for BlockExporterWrapper {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    #[instrument(skip(self, source), fields(blocks = self.blocks.len()), err)]
    fn open(
        &self,
        source: &SharedSource,
        _offset: u64,
        _compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        check_total(&self.blocks, decompressed_length)?;

        Ok(Box::new(BlockStream::new(
            source.clone(),
            self.blocks.clone(),
            BlockStrategies::Shared(self.strategy.clone()),
        )))
    }
}

/// A block paired with the strategy that decompresses it
#[derive(Debug, Clone)]
pub struct VariableBlock {
    /// Location and sizes of the block
    pub block: Block,

    /// Strategy for this block alone
    pub strategy: SharedStrategy,
}

/// Blocks that each carry their own decompression strategy
#[derive(Debug, Clone)]
pub struct BlockVariableExporterWrapper {
    blocks: Arc<[Block]>,
    strategies: Arc<[SharedStrategy]>,
}

impl BlockVariableExporterWrapper {
    /// Wrap the given blocks
    pub fn new(blocks: impl IntoIterator<Item = VariableBlock>) -> Self {
        let (blocks, strategies): (Vec<_>, Vec<_>) = blocks
            .into_iter()
            .map(|VariableBlock { block, strategy }| (block, strategy))
            .unzip();

        Self {
            blocks: blocks.into(),
            strategies: strategies.into(),
        }
    }

    /// Build from the parallel tables found in directories
    pub fn from_tables(
        offsets: &[u64],
        compressed_lengths: &[u64],
        decompressed_lengths: &[u64],
        strategies: &[SharedStrategy],
    ) -> Result<Self> {
        check_tables(
            "offset, compressed, decompressed, strategy",
            &[
                offsets.len(),
                compressed_lengths.len(),
                decompressed_lengths.len(),
                strategies.len(),
            ],
        )?;

        let blocks = offsets
            .iter()
            .zip(compressed_lengths)
            .zip(decompressed_lengths)
            .map(|((&o, &c), &d)| Block::new(o, c, d))
            .collect::<Vec<_>>();

        Ok(Self {
            blocks: blocks.into(),
            strategies: strategies.into(),
        })
    }

    /// The block table
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Strategy assigned to the block at `index`
    pub fn strategy(&self, index: usize) -> Option<&SharedStrategy> {
        self.strategies.get(index)
    }

    /// Sum of the compressed block sizes
    pub fn compressed_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.compressed_length).sum()
    }

    /// Sum of the decompressed block sizes
    pub fn decompressed_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.decompressed_length).sum()
    }
}

impl DecompressionStrategy for BlockVariableExporterWrapper {
    fn name(&self) -> &'static str {
        "Blocks"
    }

    #[instrument(skip(self, source), fields(blocks = self.blocks.len()), err)]
    fn open(
        &self,
        source: &SharedSource,
        _offset: u64,
        _compressed_length: u64,
        decompressed_length: u64,
    ) -> Result<Box<dyn DecompressedStream>> {
        check_total(&self.blocks, decompressed_length)?;

        Ok(Box::new(BlockStream::new(
            source.clone(),
            self.blocks.clone(),
            BlockStrategies::PerBlock(self.strategies.clone()),
        )))
    }
}

enum BlockStrategies {
    Shared(SharedStrategy),
    PerBlock(Arc<[SharedStrategy]>),
}

impl BlockStrategies {
    fn get(&self, index: usize) -> &SharedStrategy {
        match self {
            BlockStrategies::Shared(s) => s,
            BlockStrategies::PerBlock(s) => &s[index],
        }
    }
}

/// Pull-based stream over a block table
///
/// `index` is always either the table length or a block with output left to give.
struct BlockStream {
    source: SharedSource,
    blocks: Arc<[Block]>,
    strategies: BlockStrategies,
    index: usize,
    current: Option<Box<dyn DecompressedStream>>,
    block_produced: u64,
    produced: u64,
}

impl BlockStream {
    fn new(source: SharedSource, blocks: Arc<[Block]>, strategies: BlockStrategies) -> Self {
        let mut stream = Self {
            source,
            blocks,
            strategies,
            index: 0,
            current: None,
            block_produced: 0,
            produced: 0,
        };
        stream.skip_empty();
        stream
    }

    fn skip_empty(&mut self) {
        while self
            .blocks
            .get(self.index)
            .is_some_and(|b| b.decompressed_length == 0)
        {
            trace!(index = self.index, "skipping empty block");
            self.index += 1;
        }
    }

    /// Open the current block if needed and return it alongside the bytes it still owes
    fn current(&mut self) -> Result<(&mut Box<dyn DecompressedStream>, u64)> {
        let index = self.index;
        let block = self.blocks[index];

        let stream = match &mut self.current {
            Some(stream) => stream,
            slot => {
                trace!(
                    index,
                    offset = block.offset,
                    compressed = block.compressed_length,
                    decompressed = block.decompressed_length,
                    "opening block"
                );
                self.block_produced = 0;
                slot.insert(self.strategies.get(index).open(
                    &self.source,
                    block.offset,
                    block.compressed_length,
                    block.decompressed_length,
                )?)
            }
        };

        Ok((stream, block.decompressed_length - self.block_produced))
    }

    fn truncated(&self) -> Error {
        Error::codec(
            self.strategies.get(self.index).name(),
            format!(
                "block {} ended after {} of {} bytes",
                self.index, self.block_produced, self.blocks[self.index].decompressed_length
            ),
        )
    }

    fn advance(&mut self, count: u64) {
        self.block_produced += count;
        self.produced += count;

        if self.block_produced == self.blocks[self.index].decompressed_length {
            trace!(index = self.index, "block drained");
            self.current = None;
            self.index += 1;
            self.skip_empty();
        }
    }
}

impl DecompressedStream for BlockStream {
    fn available(&self) -> bool {
        self.index < self.blocks.len()
    }

    fn read_byte(&mut self) -> Result<u8> {
        if !self.available() {
            return Err(Error::ExhaustedStream);
        }

        let (stream, _) = self.current()?;
        if !stream.available() {
            return Err(self.truncated());
        }
        let byte = stream.read_byte()?;

        self.advance(1);
        Ok(byte)
    }

    fn produced(&self) -> u64 {
        self.produced
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;

        while count < buf.len() && self.available() {
            let (stream, left) = self.current()?;
            let want = left.min((buf.len() - count) as u64) as usize;

            let read = stream.read(&mut buf[count..count + want])?;
            if read == 0 {
                return Err(self.truncated());
            }

            count += read;
            self.advance(read as u64);
        }

        Ok(count)
    }
}
