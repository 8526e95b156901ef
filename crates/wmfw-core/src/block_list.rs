//! Resolved block lists and transaction-size chunking.
//!
//! Every data block becomes one `(address, payload)` pair; oversized
//! payloads are then split into `size_limit` chunks whose addresses follow
//! the payload byte by byte.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::MAX_BLOCK_SIZE_LIMIT;
use crate::container::{
    BlockOwner, CalibrationContainer, DataBlock, FirmwareContainer, FirmwareIdBlock,
};
use crate::error::{ConfigError, ConvertError};
use crate::memory_map::MemoryRegion;
use crate::resolver::AddressResolver;

/// Payload placed at an absolute device address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBlock {
    pub address: u32,
    pub payload: Vec<u8>,
}

impl ResolvedBlock {
    pub fn new(address: u32, payload: Vec<u8>) -> Self {
        Self { address, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// First address past the payload.
    pub fn end_address(&self) -> u64 {
        u64::from(self.address) + self.payload.len() as u64
    }
}

/// Device address of a data block.
///
/// The two containers combine offsets differently:
///
/// ```text
/// firmware:     address = resolve(region, width, start_offset)
/// calibration:  address = resolve(region, width, adjusted_offset(alg, region, 0)) + start_offset
/// abs (either): address = start_offset
/// ```
///
/// Firmware offsets are container-relative words already. Calibration
/// offsets are bytes relative to the algorithm's base address, which is
/// found through the firmware offset table.
pub fn data_block_address(
    block: &DataBlock,
    resolver: &AddressResolver,
    firmware_id: &FirmwareIdBlock,
) -> Result<u32, ConvertError> {
    let start = block.header.start_offset;
    if block.region == MemoryRegion::Abs {
        return Ok(start);
    }

    match block.owner {
        BlockOwner::Firmware => resolver.resolve(block.region, block.width, start),
        BlockOwner::Algorithm { id, .. } => {
            let base_offset = firmware_id.adjusted_offset(id, block.region, 0)?;
            let base = resolver.resolve(block.region, block.width, base_offset)?;
            base.checked_add(start).ok_or(ConvertError::AddressOverflow {
                base,
                offset: u64::from(start),
            })
        }
    }
}

/// Ordered resolved blocks for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockList {
    size_limit: usize,
    blocks: Vec<ResolvedBlock>,
}

impl BlockList {
    /// Empty list with a transaction size limit in bytes.
    pub fn new(size_limit: usize) -> Result<Self, ConvertError> {
        if size_limit == 0 {
            return Err(ConfigError::BlockSizeLimit {
                limit: size_limit,
                max: MAX_BLOCK_SIZE_LIMIT,
            }
            .into());
        }
        Ok(Self {
            size_limit,
            blocks: Vec::new(),
        })
    }

    /// Resolve every data block of a firmware container.
    pub fn firmware(
        container: &FirmwareContainer,
        resolver: &AddressResolver,
        size_limit: usize,
    ) -> Result<Self, ConvertError> {
        let mut list = Self::new(size_limit)?;
        for block in container.data_blocks() {
            list.push_data_block(block, resolver, container.firmware_id())?;
        }
        debug!(blocks = list.len(), "Resolved firmware blocks");
        Ok(list)
    }

    /// Resolve every data block of a calibration container against the
    /// firmware's offset table.
    pub fn calibration(
        container: &CalibrationContainer,
        firmware_id: &FirmwareIdBlock,
        resolver: &AddressResolver,
        size_limit: usize,
    ) -> Result<Self, ConvertError> {
        let mut list = Self::new(size_limit)?;
        for block in container.data_blocks() {
            list.push_data_block(block, resolver, firmware_id)?;
        }
        debug!(container = %container.id, blocks = list.len(), "Resolved calibration blocks");
        Ok(list)
    }

    fn push_data_block(
        &mut self,
        block: &DataBlock,
        resolver: &AddressResolver,
        firmware_id: &FirmwareIdBlock,
    ) -> Result<(), ConvertError> {
        let address = data_block_address(block, resolver, firmware_id)?;
        trace!(
            region = %block.region,
            width = %block.width,
            offset = format!("0x{:X}", block.header.start_offset),
            address = format!("0x{:08X}", address),
            len = block.payload.len(),
            "Resolved block"
        );
        self.push(ResolvedBlock::new(address, block.payload.clone()));
        Ok(())
    }

    pub fn push(&mut self, block: ResolvedBlock) {
        self.blocks.push(block);
    }

    /// Split every block whose payload is at least `size_limit` bytes.
    ///
    /// Chunk addresses are derived from the original block address plus the
    /// bytes already emitted, never re-resolved. Blocks under the limit are
    /// kept as they are and list order is preserved.
    pub fn rehash(&mut self) -> Result<(), ConvertError> {
        let before = self.blocks.len();
        let mut rehashed = Vec::with_capacity(before);

        for block in self.blocks.drain(..) {
            if block.payload.len() < self.size_limit {
                rehashed.push(block);
                continue;
            }
            let chunks = ChunkIterator::new(&block, self.size_limit);
            trace!(
                address = format!("0x{:08X}", block.address),
                len = block.len(),
                chunks = chunks.total(),
                "Splitting block"
            );
            rehashed.reserve(chunks.total());
            for chunk in chunks {
                rehashed.push(chunk?);
            }
        }

        self.blocks = rehashed;
        debug!(
            before,
            after = self.blocks.len(),
            limit = self.size_limit,
            "Rehashed blocks"
        );
        Ok(())
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn blocks(&self) -> &[ResolvedBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ResolvedBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total payload bytes across all blocks.
    pub fn total_bytes(&self) -> usize {
        self.blocks.iter().map(ResolvedBlock::len).sum()
    }
}

/// Iterator over `chunk_size` pieces of one resolved block.
#[derive(Debug)]
pub struct ChunkIterator<'a> {
    block: &'a ResolvedBlock,
    chunk_size: usize,
    offset: usize,
}

impl<'a> ChunkIterator<'a> {
    pub fn new(block: &'a ResolvedBlock, chunk_size: usize) -> Self {
        Self {
            block,
            chunk_size: chunk_size.max(1),
            offset: 0,
        }
    }

    /// Number of chunks, including a short final one.
    pub fn total(&self) -> usize {
        self.block.payload.len().div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkIterator<'_> {
    type Item = Result<ResolvedBlock, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        let payload = &self.block.payload;
        if self.offset >= payload.len() {
            return None;
        }

        let chunk_len = (payload.len() - self.offset).min(self.chunk_size);
        let chunk = &payload[self.offset..self.offset + chunk_len];
        let address = u32::try_from(u64::from(self.block.address) + self.offset as u64)
            .map_err(|_| ConvertError::AddressOverflow {
                base: self.block.address,
                offset: self.offset as u64,
            });
        self.offset += chunk_len;

        trace!(len = chunk_len, "Chunk");
        Some(address.map(|address| ResolvedBlock::new(address, chunk.to_vec())))
    }
}
