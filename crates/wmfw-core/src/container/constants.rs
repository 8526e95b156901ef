//! Container layout constants.

// ============================================================================
// Firmware container (WMFW)
// ============================================================================

/// Firmware container magic
pub const WMFW_MAGIC: [u8; 4] = *b"WMFW";

/// Header: magic, length, revision, core, version (12 bytes),
/// XM/YM/PM/ZM sizes (16 bytes), timestamp + checksum footer (12 bytes).
pub const WMFW_HEADER_LEN: usize = 40;

/// Format versions with the variable-length algorithm descriptor layout.
pub const WMFW_SUPPORTED_VERSIONS: &[u8] = &[2, 3];

pub const WMFW_OFFSET_MASK: u32 = 0x00FF_FFFF;
pub const WMFW_TYPE_SHIFT: u32 = 24;

// ============================================================================
// Calibration container (WMDR)
// ============================================================================

/// Calibration container magic
pub const WMDR_MAGIC: [u8; 4] = *b"WMDR";

/// Minimum header: magic, length, version word, core word.
pub const WMDR_MIN_HEADER_LEN: usize = 16;

pub const WMDR_SUPPORTED_REVISIONS: &[u8] = &[1, 2];

/// Calibration block payloads start on this boundary.
pub const WMDR_BLOCK_ALIGN: usize = 4;

// ============================================================================
// Block types
// ============================================================================

// Memory types (shared by both containers and by coefficient descriptors)
pub const MEM_ADSP2_PM: u16 = 0x02;
pub const MEM_ADSP2_ZM: u16 = 0x04;
pub const MEM_ADSP2_XM: u16 = 0x05;
pub const MEM_ADSP2_YM: u16 = 0x06;
pub const MEM_HALO_PM_PACKED: u16 = 0x10;
pub const MEM_HALO_XM_PACKED: u16 = 0x11;
pub const MEM_HALO_YM_PACKED: u16 = 0x12;

// Firmware container special blocks (8-bit tag)
pub const WMFW_ABSOLUTE: u8 = 0xF0;
pub const WMFW_ALGORITHM_INFO: u8 = 0xF2;
pub const WMFW_FIRMWARE_ID: u8 = 0xF3;
pub const WMFW_METADATA: u8 = 0xFC;
pub const WMFW_NAME_TEXT: u8 = 0xFE;
pub const WMFW_INFO_TEXT: u8 = 0xFF;

// Calibration container special blocks (16-bit tag, firmware tag << 8)
pub const WMDR_ABSOLUTE: u16 = (WMFW_ABSOLUTE as u16) << 8;
pub const WMDR_METADATA: u16 = (WMFW_METADATA as u16) << 8;
pub const WMDR_NAME_TEXT: u16 = (WMFW_NAME_TEXT as u16) << 8;
pub const WMDR_INFO_TEXT: u16 = (WMFW_INFO_TEXT as u16) << 8;

// ============================================================================
// Firmware id block
// ============================================================================

/// Fixed part: core id, block rev, vendor id, firmware id, firmware rev,
/// XM base/size, YM base/size, algorithm count.
pub const FIRMWARE_ID_FIXED_LEN: usize = 40;

/// Per algorithm: id, revision, XM base/size, YM base/size.
pub const FIRMWARE_ID_ALG_LEN: usize = 24;
