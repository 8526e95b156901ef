//! Calibration container (WMDR) parser.
//!
//! Blocks carry the id of the algorithm they tune. Payloads are padded to
//! the next word boundary.

use std::fmt;

use tracing::{debug, trace};

use super::block::*;
use super::constants::*;
use super::error::FormatError;
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationHeader {
    pub header_length: u32,
    /// Last byte of the version word.
    pub format_revision: u8,
    pub version_word: u32,
    pub core_word: u32,
}

/// Parsed calibration container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationContainer {
    pub id: ContainerId,
    pub header: CalibrationHeader,
    pub blocks: Vec<Block>,
}

impl CalibrationContainer {
    /// Parse a calibration container. `index` is its position among the
    /// calibration containers of the run.
    pub fn parse(data: &[u8], index: u16) -> Result<Self, FormatError> {
        let id = ContainerId::Calibration(index);
        let mut r = ByteReader::new(data);

        let magic = r.magic("calibration header")?;
        if magic != WMDR_MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: WMDR_MAGIC,
                actual: magic,
            });
        }
        let header_length = r.u32("calibration header")?;
        let version_bytes = r.take("calibration header", 4)?;
        let format_revision = version_bytes[3];
        let version_word = u32::from_le_bytes([
            version_bytes[0],
            version_bytes[1],
            version_bytes[2],
            version_bytes[3],
        ]);
        let core_word = r.u32("calibration header")?;

        if !WMDR_SUPPORTED_REVISIONS.contains(&format_revision) {
            return Err(FormatError::UnsupportedVersion {
                format: "WMDR",
                version: u32::from(format_revision),
            });
        }

        let header_len = header_length as usize;
        if header_len < WMDR_MIN_HEADER_LEN || header_len > data.len() {
            return Err(FormatError::InconsistentLength {
                what: "calibration header",
                offset: 4,
                declared: header_len,
                expected: WMDR_MIN_HEADER_LEN,
            });
        }
        r.skip_lenient(header_len - WMDR_MIN_HEADER_LEN);

        debug!(
            container = %id,
            revision = format_revision,
            size = data.len(),
            "Parsing calibration container"
        );

        let mut blocks = Vec::new();
        while !r.is_empty() {
            if let Some(block) = parse_block(&mut r, id)? {
                blocks.push(block);
            }
        }

        debug!(container = %id, blocks = blocks.len(), "Parsed calibration container");

        Ok(Self {
            id,
            header: CalibrationHeader {
                header_length,
                format_revision,
                version_word,
                core_word,
            },
            blocks,
        })
    }

    pub fn data_blocks(&self) -> impl Iterator<Item = &DataBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Data(d) => Some(d),
            _ => None,
        })
    }

    /// Informational text blocks only; name and metadata text are skipped.
    pub fn informational_text(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            Block::InformationalText(t) if t.header.block_type == BlockType::InfoText => Some(t),
            _ => None,
        })
    }
}

/// Parse one block; `None` for a data block without payload.
fn parse_block(
    r: &mut ByteReader<'_>,
    container: ContainerId,
) -> Result<Option<Block>, FormatError> {
    let file_offset = r.offset();
    let start_offset = r.u16("block header")?;
    let tag = r.u16("block header")?;
    let algorithm_id = r.u32("block header")?;
    let algorithm_version = r.u32("block header")?;
    let sample_rate = r.u32("block header")?;
    let len = r.u32("block header")? as usize;

    let block_type = BlockType::from_wmdr_tag(tag).ok_or(FormatError::UnknownBlockType {
        block_type: tag,
        offset: file_offset,
    })?;
    let header = BlockHeader {
        block_type,
        start_offset: u32::from(start_offset),
        container,
        file_offset,
    };

    let payload = r.sub_reader("block payload", len)?.take("block payload", len)?;
    let padding = (WMDR_BLOCK_ALIGN - len % WMDR_BLOCK_ALIGN) % WMDR_BLOCK_ALIGN;
    r.skip_lenient(padding);

    trace!(
        offset = format!("0x{:X}", file_offset),
        kind = %block_type,
        algorithm = format!("0x{:06X}", algorithm_id),
        len,
        "Block"
    );

    if block_type.is_text() {
        return Ok(Some(Block::InformationalText(TextBlock {
            header,
            text: String::from_utf8_lossy(payload)
                .trim_end_matches('\0')
                .to_string(),
        })));
    }

    let (region, width) = block_type.location().ok_or(FormatError::UnknownBlockType {
        block_type: tag,
        offset: file_offset,
    })?;
    if payload.is_empty() {
        debug!(
            offset = format!("0x{:X}", file_offset),
            kind = %block_type,
            "Skipping empty data block"
        );
        return Ok(None);
    }

    Ok(Some(Block::Data(DataBlock {
        header,
        region,
        width,
        owner: BlockOwner::Algorithm {
            id: algorithm_id,
            version: algorithm_version,
            sample_rate,
        },
        payload: payload.to_vec(),
    })))
}

impl fmt::Display for CalibrationContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Calibration container {} (revision {}):",
            self.id, self.header.format_revision
        )?;
        writeln!(f, "  Blocks: {}", self.blocks.len())?;
        for data in self.data_blocks() {
            let algorithm = match data.owner {
                BlockOwner::Algorithm { id, .. } => format!("0x{:06X}", id),
                BlockOwner::Firmware => "firmware".to_string(),
            };
            writeln!(
                f,
                "  Data {:<18} alg {} {}/{} offset 0x{:04X} ({} bytes)",
                data.header.block_type,
                algorithm,
                data.region,
                data.width,
                data.header.start_offset,
                data.payload.len()
            )?;
        }
        for text in self.informational_text() {
            for line in text.text.lines() {
                writeln!(f, "  | {}", line)?;
            }
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
    fn test_parse_blocks_in_order() {
        let data = WmdrBuilder::new()
            .block(MEM_ADSP2_XM, 8, 0xF100, &[1, 2, 3, 4, 5, 6])
            .text("tuned on bench 3\nspeaker A")
            .block(WMDR_ABSOLUTE, 0x5000, 0, &[7, 7, 7, 7])
            .block(WMDR_NAME_TEXT, 0, 0, b"name")
            .build();
        let cal = CalibrationContainer::parse(&data, 1).unwrap();
        assert_eq!(cal.id, ContainerId::Calibration(1));
        assert_eq!(cal.header.format_revision, 2);
        assert_eq!(cal.blocks.len(), 4);

        let blocks: Vec<_> = cal.data_blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].region, MemoryRegion::Xm);
        assert_eq!(blocks[0].width, DataWidth::U24);
        assert_eq!(blocks[0].header.start_offset, 8);
        assert_eq!(blocks[0].payload, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            blocks[0].owner,
            BlockOwner::Algorithm {
                id: 0xF100,
                version: 0x0001_0000,
                sample_rate: 48000
            }
        );
        assert_eq!(blocks[1].region, MemoryRegion::Abs);
        assert_eq!(blocks[1].header.start_offset, 0x5000);

        let texts: Vec<_> = cal.informational_text().collect();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].text, "tuned on bench 3\nspeaker A");
    }

    #[test]
    fn test_missing_final_padding_tolerated() {
        let mut data = WmdrBuilder::new()
            .block(MEM_ADSP2_YM, 0, 0xF100, &[1, 2, 3])
            .build();
        data.pop();
        let cal = CalibrationContainer::parse(&data, 0).unwrap();
        assert_eq!(cal.data_blocks().next().unwrap().payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_data_block_skipped() {
        let data = WmdrBuilder::new()
            .block(MEM_ADSP2_XM, 0, 0xF100, &[1, 2, 3, 4])
            .block(MEM_ADSP2_XM, 4, 0xF100, &[])
            .block(MEM_ADSP2_YM, 8, 0xF100, &[5, 6, 7, 8])
            .build();
        let cal = CalibrationContainer::parse(&data, 0).unwrap();
        assert_eq!(cal.blocks.len(), 2);

        let offsets: Vec<_> = cal.data_blocks().map(|b| b.header.start_offset).collect();
        assert_eq!(offsets, vec![0, 8]);
    }

    #[test]
    fn test_bad_magic_and_revision() {
        let mut data = WmdrBuilder::new().build();
        data[3] = b'X';
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::InvalidMagic { .. })
        ));

        let data = WmdrBuilder::new().revision(3).build();
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::UnsupportedVersion {
                format: "WMDR",
                version: 3
            })
        ));
    }

    #[test]
    fn test_header_length_inconsistent() {
        let mut data = WmdrBuilder::new().build();
        data[4..8].copy_from_slice(&64u32.to_le_bytes());
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::InconsistentLength {
                what: "calibration header",
                ..
            })
        ));
    }

    #[test]
    fn test_firmware_only_blocks_rejected() {
        let data = WmdrBuilder::new().block(0x00F3, 0, 0, &[0; 4]).build();
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::UnknownBlockType {
                block_type: 0x00F3,
                offset: 16
            })
        ));
    }

    #[test]
    fn test_truncated_block() {
        let mut data = WmdrBuilder::new()
            .block(MEM_ADSP2_XM, 0, 1, &[0; 8])
            .build();
        data.truncate(16 + 10);
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::Truncated {
                what: "block header",
                ..
            })
        ));

        let mut data = WmdrBuilder::new()
            .block(MEM_ADSP2_XM, 0, 1, &[0; 8])
            .build();
        data.truncate(data.len() - 4);
        assert!(matches!(
            CalibrationContainer::parse(&data, 0),
            Err(FormatError::InconsistentLength {
                what: "block payload",
                ..
            })
        ));
    }
}
