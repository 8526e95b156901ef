//! Typed container blocks.

use std::fmt;

use tracing::{debug, trace};

use super::constants::*;
use super::error::FormatError;
use super::reader::ByteReader;
use crate::error::ConvertError;
use crate::memory_map::{DataWidth, MemoryRegion};

/// Which container of a run a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    Firmware,
    /// Index among the calibration containers of the run.
    Calibration(u16),
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Firmware => write!(f, "firmware"),
            ContainerId::Calibration(i) => write!(f, "calibration[{}]", i),
        }
    }
}

/// Decoded block type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    AdspPm,
    AdspZm,
    AdspXm,
    AdspYm,
    HaloPmPacked,
    HaloXmPacked,
    HaloYmPacked,
    Absolute,
    AlgorithmInfo,
    FirmwareId,
    Metadata,
    NameText,
    InfoText,
}

impl BlockType {
    /// Memory type codes, as used by data blocks and coefficient descriptors.
    pub fn from_memory_code(code: u16) -> Option<Self> {
        match code {
            MEM_ADSP2_PM => Some(BlockType::AdspPm),
            MEM_ADSP2_ZM => Some(BlockType::AdspZm),
            MEM_ADSP2_XM => Some(BlockType::AdspXm),
            MEM_ADSP2_YM => Some(BlockType::AdspYm),
            MEM_HALO_PM_PACKED => Some(BlockType::HaloPmPacked),
            MEM_HALO_XM_PACKED => Some(BlockType::HaloXmPacked),
            MEM_HALO_YM_PACKED => Some(BlockType::HaloYmPacked),
            _ => None,
        }
    }

    /// 8-bit firmware container tag.
    pub fn from_wmfw_tag(tag: u8) -> Option<Self> {
        match tag {
            WMFW_ABSOLUTE => Some(BlockType::Absolute),
            WMFW_ALGORITHM_INFO => Some(BlockType::AlgorithmInfo),
            WMFW_FIRMWARE_ID => Some(BlockType::FirmwareId),
            WMFW_METADATA => Some(BlockType::Metadata),
            WMFW_NAME_TEXT => Some(BlockType::NameText),
            WMFW_INFO_TEXT => Some(BlockType::InfoText),
            other => Self::from_memory_code(u16::from(other)),
        }
    }

    /// 16-bit calibration container tag. Algorithm info and firmware id
    /// blocks cannot appear in calibration containers.
    pub fn from_wmdr_tag(tag: u16) -> Option<Self> {
        match tag {
            WMDR_ABSOLUTE => Some(BlockType::Absolute),
            WMDR_METADATA => Some(BlockType::Metadata),
            WMDR_NAME_TEXT => Some(BlockType::NameText),
            WMDR_INFO_TEXT => Some(BlockType::InfoText),
            other => Self::from_memory_code(other),
        }
    }

    /// Region and word width addressed by a data block of this type.
    pub fn location(self) -> Option<(MemoryRegion, DataWidth)> {
        match self {
            BlockType::AdspPm | BlockType::HaloPmPacked => Some((MemoryRegion::Pm, DataWidth::Pm32)),
            BlockType::AdspZm => Some((MemoryRegion::Zm, DataWidth::U24)),
            BlockType::AdspXm => Some((MemoryRegion::Xm, DataWidth::U24)),
            BlockType::AdspYm => Some((MemoryRegion::Ym, DataWidth::U24)),
            BlockType::HaloXmPacked => Some((MemoryRegion::Xm, DataWidth::P32)),
            BlockType::HaloYmPacked => Some((MemoryRegion::Ym, DataWidth::P32)),
            BlockType::Absolute => Some((MemoryRegion::Abs, DataWidth::U32)),
            _ => None,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            BlockType::Metadata | BlockType::NameText | BlockType::InfoText
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::AdspPm => "PM",
            BlockType::AdspZm => "ZM",
            BlockType::AdspXm => "XM",
            BlockType::AdspYm => "YM",
            BlockType::HaloPmPacked => "PM (packed)",
            BlockType::HaloXmPacked => "XM (packed)",
            BlockType::HaloYmPacked => "YM (packed)",
            BlockType::Absolute => "Absolute",
            BlockType::AlgorithmInfo => "Algorithm Info",
            BlockType::FirmwareId => "Firmware ID",
            BlockType::Metadata => "Metadata",
            BlockType::NameText => "Name Text",
            BlockType::InfoText => "Informational Text",
        };
        write!(f, "{}", name)
    }
}

/// Fields common to every block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: BlockType,
    /// Start offset in words, or a byte address for `abs` blocks.
    pub start_offset: u32,
    pub container: ContainerId,
    /// Byte offset of the block header within its container file.
    pub file_offset: usize,
}

impl BlockHeader {
    pub fn region(&self) -> Option<MemoryRegion> {
        self.block_type.location().map(|(r, _)| r)
    }

    pub fn width(&self) -> Option<DataWidth> {
        self.block_type.location().map(|(_, w)| w)
    }
}

/// Who a data block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOwner {
    /// Program or data image of the firmware itself.
    Firmware,
    /// Calibration values for one algorithm.
    Algorithm {
        id: u32,
        version: u32,
        sample_rate: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub header: BlockHeader,
    pub region: MemoryRegion,
    pub width: DataWidth,
    pub owner: BlockOwner,
    /// Never empty.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub header: BlockHeader,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientDescriptor {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub region: MemoryRegion,
    pub width: DataWidth,
    /// Word offset relative to the owning algorithm's base in `region`.
    pub start_offset: u32,
    pub control_type: u16,
    pub flags: u16,
    /// Length of the coefficient in bytes.
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmInfoBlock {
    pub header: BlockHeader,
    pub algorithm_id: u32,
    pub name: String,
    pub description: String,
    pub coefficients: Vec<CoefficientDescriptor>,
}

impl AlgorithmInfoBlock {
    pub(crate) fn parse(header: BlockHeader, r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let algorithm_id = r.u32("algorithm id")?;
        let name = r.padded_string("algorithm name", 1)?;
        let description = r.padded_string("algorithm description", 2)?;
        let count = r.u32("coefficient count")?;

        let mut coefficients = Vec::new();
        for _ in 0..count {
            coefficients.push(parse_coefficient(r)?);
        }

        trace!(
            algorithm = %name,
            id = format!("0x{:06X}", algorithm_id),
            coefficients = coefficients.len(),
            "Parsed algorithm info"
        );

        Ok(Self {
            header,
            algorithm_id,
            name,
            description,
            coefficients,
        })
    }
}

fn parse_coefficient(r: &mut ByteReader<'_>) -> Result<CoefficientDescriptor, FormatError> {
    let offset = r.offset();
    let start_offset = r.u16("coefficient descriptor")?;
    let memory_type = r.u16("coefficient descriptor")?;
    let body_len = r.u32("coefficient descriptor")? as usize;

    let (region, width) = BlockType::from_memory_code(memory_type)
        .and_then(BlockType::location)
        .ok_or(FormatError::UnknownMemoryType {
            memory_type,
            offset,
        })?;

    let mut body = r.sub_reader("coefficient descriptor", body_len)?;
    let name = body.padded_string("coefficient name", 1)?;
    let full_name = body.padded_string("coefficient full name", 1)?;
    let description = body.padded_string("coefficient description", 2)?;
    let control_type = body.u16("coefficient control type")?;
    let flags = body.u16("coefficient flags")?;
    let length = body.u32("coefficient length")?;

    Ok(CoefficientDescriptor {
        name,
        full_name,
        description,
        region,
        width,
        start_offset: u32::from(start_offset),
        control_type,
        flags,
        length,
    })
}

/// One row of the firmware offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmEntry {
    pub id: u32,
    pub revision: u32,
    pub xm_base: u32,
    pub xm_size: u32,
    pub ym_base: u32,
    pub ym_size: u32,
}

impl AlgorithmEntry {
    /// Word base of this algorithm in `region`; regions without a table
    /// column start at zero.
    pub fn region_base(&self, region: MemoryRegion) -> u32 {
        match region {
            MemoryRegion::Xm => self.xm_base,
            MemoryRegion::Ym => self.ym_base,
            _ => 0,
        }
    }
}

/// Algorithm id -> per-region base offsets, in container order.
///
/// Lookups are first-wins: a repeated id keeps its first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<AlgorithmEntry>,
}

impl OffsetTable {
    pub fn get(&self, algorithm_id: u32) -> Option<&AlgorithmEntry> {
        self.entries.iter().find(|e| e.id == algorithm_id)
    }

    pub fn entries(&self) -> &[AlgorithmEntry] {
        &self.entries
    }

    /// Append `entry` unless its id is already present.
    fn insert(&mut self, entry: AlgorithmEntry) -> bool {
        if self.get(entry.id).is_some() {
            debug!(
                algorithm = format!("0x{:06X}", entry.id),
                "Ignoring repeated algorithm entry"
            );
            return false;
        }
        self.entries.push(entry);
        true
    }
}

/// Firmware identity and algorithm offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareIdBlock {
    pub header: BlockHeader,
    pub core_id: u32,
    pub block_revision: u32,
    pub vendor_id: u32,
    pub firmware_id: u32,
    pub firmware_revision: u32,
    /// Includes the firmware's own id, with the firmware header's bases.
    pub offsets: OffsetTable,
}

impl FirmwareIdBlock {
    pub(crate) fn parse(header: BlockHeader, r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let offset = r.offset();
        let payload_len = r.remaining();
        if payload_len < FIRMWARE_ID_FIXED_LEN {
            return Err(FormatError::InconsistentLength {
                what: "firmware id block",
                offset,
                declared: payload_len,
                expected: FIRMWARE_ID_FIXED_LEN,
            });
        }

        let core_id = r.u32("firmware id")?;
        let block_revision = r.u32("firmware id")?;
        let vendor_id = r.u32("firmware id")?;
        let firmware_id = r.u32("firmware id")?;
        let firmware_revision = r.u32("firmware id")?;
        let xm_base = r.u32("firmware id")?;
        let xm_size = r.u32("firmware id")?;
        let ym_base = r.u32("firmware id")?;
        let ym_size = r.u32("firmware id")?;
        let count = r.u32("firmware id")? as usize;

        let expected = count
            .checked_mul(FIRMWARE_ID_ALG_LEN)
            .and_then(|n| n.checked_add(FIRMWARE_ID_FIXED_LEN))
            .unwrap_or(usize::MAX);
        if payload_len != expected {
            return Err(FormatError::InconsistentLength {
                what: "firmware id block",
                offset,
                declared: payload_len,
                expected,
            });
        }

        let mut listed = OffsetTable::default();
        for _ in 0..count {
            listed.insert(AlgorithmEntry {
                id: r.u32("algorithm entry")?,
                revision: r.u32("algorithm entry")?,
                xm_base: r.u32("algorithm entry")?,
                xm_size: r.u32("algorithm entry")?,
                ym_base: r.u32("algorithm entry")?,
                ym_size: r.u32("algorithm entry")?,
            });
        }

        // The firmware's own entry comes first; an explicit list entry for
        // the same id replaces the header bases.
        let mut offsets = OffsetTable::default();
        match listed.get(firmware_id) {
            Some(entry) => {
                debug!(
                    firmware = format!("0x{:06X}", firmware_id),
                    "Algorithm list names the firmware id"
                );
                offsets.insert(*entry);
            }
            None => {
                offsets.insert(AlgorithmEntry {
                    id: firmware_id,
                    revision: firmware_revision,
                    xm_base,
                    xm_size,
                    ym_base,
                    ym_size,
                });
            }
        }
        for entry in listed.entries {
            offsets.insert(entry);
        }

        Ok(Self {
            header,
            core_id,
            block_revision,
            vendor_id,
            firmware_id,
            firmware_revision,
            offsets,
        })
    }

    /// Translate an algorithm-relative word offset into a container-relative one:
    /// `base(algorithm_id, region) + local_offset`.
    pub fn adjusted_offset(
        &self,
        algorithm_id: u32,
        region: MemoryRegion,
        local_offset: u32,
    ) -> Result<u32, ConvertError> {
        let entry = self
            .offsets
            .get(algorithm_id)
            .ok_or(ConvertError::UnknownAlgorithm { algorithm_id })?;
        let base = entry.region_base(region);
        base.checked_add(local_offset)
            .ok_or(ConvertError::AddressOverflow {
                base,
                offset: u64::from(local_offset),
            })
    }
}

/// A block in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Data(DataBlock),
    AlgorithmInfo(AlgorithmInfoBlock),
    FirmwareId(FirmwareIdBlock),
    InformationalText(TextBlock),
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Data(b) => &b.header,
            Block::AlgorithmInfo(b) => &b.header,
            Block::FirmwareId(b) => &b.header,
            Block::InformationalText(b) => &b.header,
        }
    }
}
