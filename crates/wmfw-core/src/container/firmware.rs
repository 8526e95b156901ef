//! Firmware container (WMFW) parser.
//!
//! Layout: a 40-byte header (magic, header length, API revision, core type,
//! format version, memory sizes, timestamp, checksum) followed by blocks.
//! Each block starts with a word holding the 24-bit start offset in its low
//! bits and the 8-bit block type in its top byte, then the payload length.

use std::fmt;

use tracing::{debug, trace};

use super::block::*;
use super::constants::*;
use super::error::FormatError;
use super::reader::ByteReader;

/// Firmware container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub api_revision: u16,
    pub core_type: u8,
    pub format_version: u8,
    pub xm_size: u32,
    pub ym_size: u32,
    pub pm_size: u32,
    pub zm_size: u32,
    pub timestamp: u64,
    pub checksum: u32,
}

impl FirmwareHeader {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let magic = r.magic("firmware header")?;
        if magic != WMFW_MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: WMFW_MAGIC,
                actual: magic,
            });
        }

        let header_len = r.u32("firmware header")? as usize;
        let api_revision = r.u16("firmware header")?;
        let core_type = r.u8("firmware header")?;
        let format_version = r.u8("firmware header")?;
        if !WMFW_SUPPORTED_VERSIONS.contains(&format_version) {
            return Err(FormatError::UnsupportedVersion {
                format: "WMFW",
                version: u32::from(format_version),
            });
        }

        let header = Self {
            api_revision,
            core_type,
            format_version,
            xm_size: r.u32("firmware header")?,
            ym_size: r.u32("firmware header")?,
            pm_size: r.u32("firmware header")?,
            zm_size: r.u32("firmware header")?,
            timestamp: r.u64("firmware header")?,
            checksum: r.u32("firmware header")?,
        };

        if header_len != WMFW_HEADER_LEN {
            return Err(FormatError::InconsistentLength {
                what: "firmware header",
                offset: 4,
                declared: header_len,
                expected: WMFW_HEADER_LEN,
            });
        }

        Ok(header)
    }
}

/// Parsed firmware container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareContainer {
    pub header: FirmwareHeader,
    /// Every block, in file order.
    pub blocks: Vec<Block>,
    firmware_id: FirmwareIdBlock,
}

impl FirmwareContainer {
    /// Parse a firmware container, stopping at the first malformed block.
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(data);
        let header = FirmwareHeader::parse(&mut r)?;
        debug!(
            version = header.format_version,
            core = header.core_type,
            size = data.len(),
            "Parsing firmware container"
        );

        let mut blocks = Vec::new();
        let mut firmware_id: Option<FirmwareIdBlock> = None;

        while !r.is_empty() {
            let Some(block) = parse_block(&mut r)? else {
                continue;
            };
            if let Block::FirmwareId(id) = &block {
                if firmware_id.is_some() {
                    return Err(FormatError::DuplicateFirmwareId {
                        offset: id.header.file_offset,
                    });
                }
                firmware_id = Some(id.clone());
            }
            blocks.push(block);
        }

        let firmware_id = firmware_id.ok_or(FormatError::MissingFirmwareId)?;
        debug!(
            blocks = blocks.len(),
            firmware_id = format!("0x{:06X}", firmware_id.firmware_id),
            algorithms = firmware_id.offsets.entries().len(),
            "Parsed firmware container"
        );

        Ok(Self {
            header,
            blocks,
            firmware_id,
        })
    }

    pub fn firmware_id(&self) -> &FirmwareIdBlock {
        &self.firmware_id
    }

    pub fn data_blocks(&self) -> impl Iterator<Item = &DataBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Data(d) => Some(d),
            _ => None,
        })
    }

    pub fn algorithm_blocks(&self) -> impl Iterator<Item = &AlgorithmInfoBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::AlgorithmInfo(a) => Some(a),
            _ => None,
        })
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::InformationalText(t) => Some(t),
            _ => None,
        })
    }
}

/// Parse one block; `None` for a data block without payload.
fn parse_block(r: &mut ByteReader<'_>) -> Result<Option<Block>, FormatError> {
    let file_offset = r.offset();
    let word = r.u32("block header")?;
    let len = r.u32("block header")? as usize;

    let tag = (word >> WMFW_TYPE_SHIFT) as u8;
    let block_type = BlockType::from_wmfw_tag(tag).ok_or(FormatError::UnknownBlockType {
        block_type: u16::from(tag),
        offset: file_offset,
    })?;
    let header = BlockHeader {
        block_type,
        start_offset: word & WMFW_OFFSET_MASK,
        container: ContainerId::Firmware,
        file_offset,
    };

    let mut payload = r.sub_reader("block payload", len)?;
    trace!(
        offset = format!("0x{:X}", file_offset),
        kind = %block_type,
        len,
        "Block"
    );

    let block = match block_type {
        BlockType::AlgorithmInfo => Block::AlgorithmInfo(AlgorithmInfoBlock::parse(header, &mut payload)?),
        BlockType::FirmwareId => Block::FirmwareId(FirmwareIdBlock::parse(header, &mut payload)?),
        t if t.is_text() => {
            let bytes = payload.take("text block", len)?;
            Block::InformationalText(TextBlock {
                header,
                text: String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
            })
        }
        t => {
            let (region, width) = t.location().ok_or(FormatError::UnknownBlockType {
                block_type: u16::from(tag),
                offset: file_offset,
            })?;
            if len == 0 {
                debug!(
                    offset = format!("0x{:X}", file_offset),
                    kind = %t,
                    "Skipping empty data block"
                );
                return Ok(None);
            }
            Block::Data(DataBlock {
                header,
                region,
                width,
                owner: BlockOwner::Firmware,
                payload: payload.take("block payload", len)?.to_vec(),
            })
        }
    };

    Ok(Some(block))
}

impl fmt::Display for FirmwareContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.firmware_id;
        writeln!(
            f,
            "Firmware container (format v{}, core type {}, API rev {}):",
            self.header.format_version, self.header.core_type, self.header.api_revision
        )?;
        writeln!(
            f,
            "  Sizes:        XM 0x{:X}  YM 0x{:X}  PM 0x{:X}  ZM 0x{:X}",
            self.header.xm_size, self.header.ym_size, self.header.pm_size, self.header.zm_size
        )?;
        writeln!(f, "  Firmware ID:  0x{:06X}", id.firmware_id)?;
        writeln!(f, "  Revision:     0x{:06X}", id.firmware_revision)?;
        writeln!(f, "  Vendor ID:    0x{:X}", id.vendor_id)?;
        writeln!(f, "  Blocks:       {}", self.blocks.len())?;

        writeln!(f, "  Algorithms:")?;
        for entry in id.offsets.entries() {
            writeln!(
                f,
                "    0x{:06X} rev 0x{:06X}  XM 0x{:04X}+0x{:X}  YM 0x{:04X}+0x{:X}",
                entry.id, entry.revision, entry.xm_base, entry.xm_size, entry.ym_base, entry.ym_size
            )?;
        }

        for alg in self.algorithm_blocks() {
            writeln!(
                f,
                "  Algorithm {} (0x{:06X}): {} coefficients",
                alg.name,
                alg.algorithm_id,
                alg.coefficients.len()
            )?;
            for c in &alg.coefficients {
                writeln!(
                    f,
                    "    {:<32} {}/{} +0x{:X} ({} bytes)",
                    c.full_name, c.region, c.width, c.start_offset, c.length
                )?;
            }
        }

        for data in self.data_blocks() {
            writeln!(
                f,
                "  Data {:<18} {}/{} offset 0x{:06X} ({} bytes)",
                data.header.block_type,
                data.region,
                data.width,
                data.header.start_offset,
                data.payload.len()
            )?;
        }

        for text in self.text_blocks() {
            writeln!(f, "  {}: {}", text.header.block_type, text.text)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testutil::*;
    use crate::memory_map::{DataWidth, MemoryRegion};

    #[test]
    fn test_parse_sample() {
        let fw = FirmwareContainer::parse(&sample_firmware()).unwrap();
        assert_eq!(fw.header.format_version, 3);
        assert_eq!(fw.blocks.len(), 7);

        // File order is preserved.
        assert!(matches!(fw.blocks[0], Block::InformationalText(_)));
        assert!(matches!(fw.blocks[1], Block::FirmwareId(_)));
        assert!(matches!(fw.blocks[2], Block::AlgorithmInfo(_)));

        let id = fw.firmware_id();
        assert_eq!(id.firmware_id, 0x40000);
        assert_eq!(id.firmware_revision, 0x010203);
        assert_eq!(id.offsets.entries().len(), 2);
        assert_eq!(id.offsets.get(0xF100).unwrap().ym_base, 0x200);
        assert_eq!(id.offsets.get(0x40000).unwrap().xm_base, 0x10);

        let data: Vec<_> = fw.data_blocks().collect();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0].region, MemoryRegion::Xm);
        assert_eq!(data[0].width, DataWidth::U24);
        assert_eq!(data[0].header.start_offset, 2);
        assert_eq!(data[0].payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(data[1].width, DataWidth::P32);
        assert_eq!(data[2].region, MemoryRegion::Abs);
        assert_eq!(data[2].header.start_offset, 0x5000);

        assert_eq!(fw.text_blocks().next().unwrap().text, "built by tests");
    }

    #[test]
    fn test_parse_algorithm_info() {
        let fw = FirmwareContainer::parse(&sample_firmware()).unwrap();
        let algs: Vec<_> = fw.algorithm_blocks().collect();
        assert_eq!(algs.len(), 2);
        assert_eq!(algs[1].name, "EQ");
        assert_eq!(algs[1].algorithm_id, 0xF100);

        let gain = &algs[1].coefficients[0];
        assert_eq!(gain.name, "GAIN");
        assert_eq!(gain.full_name, "EQ GAIN");
        assert_eq!(gain.description, "test coefficient");
        assert_eq!(gain.region, MemoryRegion::Xm);
        assert_eq!(gain.start_offset, 3);
        assert_eq!(gain.control_type, 0x1000);
        assert_eq!(gain.flags, 3);
        assert_eq!(gain.length, 4);

        assert_eq!(algs[0].coefficients[0].width, DataWidth::P32);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = sample_firmware();
        data[0..4].copy_from_slice(b"WMDR");
        assert_eq!(
            FirmwareContainer::parse(&data),
            Err(FormatError::InvalidMagic {
                expected: *b"WMFW",
                actual: *b"WMDR"
            })
        );
    }

    #[test]
    fn test_unsupported_version() {
        let id = firmware_id(1, 1, 0, 0, &[]);
        let data = WmfwBuilder::new()
            .version(1)
            .block(WMFW_FIRMWARE_ID, 0, &id)
            .build();
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::UnsupportedVersion { version: 1, .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let data = sample_firmware();
        assert!(matches!(
            FirmwareContainer::parse(&data[..20]),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_block_header() {
        let id = firmware_id(1, 1, 0, 0, &[]);
        let mut data = WmfwBuilder::new().block(WMFW_FIRMWARE_ID, 0, &id).build();
        data.extend_from_slice(&[0x02, 0x00, 0x00]);
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::Truncated {
                what: "block header",
                ..
            })
        ));
    }

    #[test]
    fn test_block_length_past_end() {
        let mut data = sample_firmware();
        // Shrink the file so the last block's payload is cut short.
        data.truncate(data.len() - 2);
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::InconsistentLength {
                what: "block payload",
                declared: 4,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_firmware_id_length_mismatch() {
        let mut id = firmware_id(1, 1, 0, 0, &[(2, 0, 0)]);
        id.truncate(id.len() - 4);
        let data = WmfwBuilder::new().block(WMFW_FIRMWARE_ID, 0, &id).build();
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::InconsistentLength {
                what: "firmware id block",
                ..
            })
        ));
    }

    #[test]
    fn test_firmware_id_required_once() {
        let data = WmfwBuilder::new()
            .block(MEM_ADSP2_XM as u8, 0, &[0; 4])
            .build();
        assert_eq!(
            FirmwareContainer::parse(&data),
            Err(FormatError::MissingFirmwareId)
        );

        let id = firmware_id(1, 1, 0, 0, &[]);
        let data = WmfwBuilder::new()
            .block(WMFW_FIRMWARE_ID, 0, &id)
            .block(WMFW_FIRMWARE_ID, 0, &id)
            .build();
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::DuplicateFirmwareId { .. })
        ));
    }

    #[test]
    fn test_unknown_block_type() {
        let id = firmware_id(1, 1, 0, 0, &[]);
        let data = WmfwBuilder::new()
            .block(WMFW_FIRMWARE_ID, 0, &id)
            .block(0x77, 0, &[0; 4])
            .build();
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::UnknownBlockType {
                block_type: 0x77,
                offset: 88
            })
        ));
    }

    #[test]
    fn test_algorithm_list_repeats_firmware_id() {
        let id = firmware_id(
            0x40000,
            1,
            0x10,
            0x20,
            &[(0x40000, 0x30, 0x40), (0xF100, 0x100, 0x200), (0xF100, 0x500, 0x600)],
        );
        let data = WmfwBuilder::new().block(WMFW_FIRMWARE_ID, 0, &id).build();
        let fw = FirmwareContainer::parse(&data).unwrap();
        let id = fw.firmware_id();

        // Listed entry replaces the header bases, and stays first.
        assert_eq!(id.offsets.entries().len(), 2);
        assert_eq!(id.offsets.entries()[0].id, 0x40000);
        assert_eq!(id.adjusted_offset(0x40000, MemoryRegion::Xm, 1).unwrap(), 0x31);
        assert_eq!(id.adjusted_offset(0x40000, MemoryRegion::Ym, 0).unwrap(), 0x40);
        // Repeated ids keep the first entry.
        assert_eq!(id.adjusted_offset(0xF100, MemoryRegion::Xm, 0).unwrap(), 0x100);
    }

    #[test]
    fn test_empty_data_block_skipped() {
        let data = WmfwBuilder::new()
            .block(WMFW_FIRMWARE_ID, 0, &firmware_id(1, 1, 0, 0, &[]))
            .block(MEM_ADSP2_XM as u8, 2, &[1, 2, 3, 4])
            .block(MEM_ADSP2_XM as u8, 4, &[])
            .block(MEM_ADSP2_YM as u8, 8, &[5, 6, 7, 8])
            .build();
        let fw = FirmwareContainer::parse(&data).unwrap();

        assert_eq!(fw.blocks.len(), 3);
        let blocks: Vec<_> = fw.data_blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].header.start_offset, 2);
        assert_eq!(blocks[1].region, MemoryRegion::Ym);
        assert!(blocks.iter().all(|b| !b.payload.is_empty()));
    }

    #[test]
    fn test_coefficient_body_overrun() {
        let mut algs = algorithm_info(
            7,
            "A",
            &[Coeff {
                name: "X",
                full_name: "A X",
                memory_type: MEM_ADSP2_XM,
                offset: 0,
            }],
        );
        // Shrink the declared descriptor body by one word.
        let size_at = 4 + 4 + 4 + 4 + 4;
        let size = u32::from_le_bytes(algs[size_at..size_at + 4].try_into().unwrap());
        algs[size_at..size_at + 4].copy_from_slice(&(size - 4).to_le_bytes());

        let id = firmware_id(7, 1, 0, 0, &[]);
        let data = WmfwBuilder::new()
            .block(WMFW_FIRMWARE_ID, 0, &id)
            .block(WMFW_ALGORITHM_INFO, 0, &algs)
            .build();
        assert!(matches!(
            FirmwareContainer::parse(&data),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_display_summary() {
        let fw = FirmwareContainer::parse(&sample_firmware()).unwrap();
        let text = fw.to_string();
        assert!(text.contains("Firmware ID:  0x040000"));
        assert!(text.contains("Algorithm EQ (0x00F100): 2 coefficients"));
        assert!(text.contains("built by tests"));
    }
}
