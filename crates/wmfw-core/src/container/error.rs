//! Container format errors.

use thiserror::Error;

/// Structural problem in a container. Parsing stops at the first one.
///
/// Offsets are byte positions within the container file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid magic: expected \"{}\", got \"{}\"", .expected.escape_ascii(), .actual.escape_ascii())]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("Unsupported {format} format version {version}")]
    UnsupportedVersion { format: &'static str, version: u32 },

    #[error("Truncated {what} at offset 0x{offset:X}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Inconsistent {what} length at offset 0x{offset:X}: declared {declared}, expected {expected}")]
    InconsistentLength {
        what: &'static str,
        offset: usize,
        declared: usize,
        expected: usize,
    },

    #[error("Unknown block type 0x{block_type:04X} at offset 0x{offset:X}")]
    UnknownBlockType { block_type: u16, offset: usize },

    #[error("Unknown memory type 0x{memory_type:04X} at offset 0x{offset:X}")]
    UnknownMemoryType { memory_type: u16, offset: usize },

    #[error("Invalid {what} text at offset 0x{offset:X}")]
    InvalidText { what: &'static str, offset: usize },

    #[error("Firmware container has no firmware id block")]
    MissingFirmwareId,

    #[error("Duplicate firmware id block at offset 0x{offset:X}")]
    DuplicateFirmwareId { offset: usize },
}
