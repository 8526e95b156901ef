//! Error types shared across the conversion pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::container::FormatError;
use crate::memory_map::{DataWidth, MemoryRegion};

/// Configuration problems detected before or while setting up a run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported part number: {part}")]
    UnsupportedPart { part: String },

    #[error("Invalid block size limit: {limit} (must be between 1 and {max} bytes)")]
    BlockSizeLimit { limit: usize, max: usize },

    #[error("Unsupported memory map table version {version} (expected {expected})")]
    UnsupportedMapVersion { version: u32, expected: u32 },

    #[error("Invalid memory map '{map}': {message}")]
    InvalidMemoryMap { map: String, message: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any error that aborts a conversion run.
///
/// None of these are recoverable: the run stops at the first one and no
/// artifact is produced.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Unknown algorithm 0x{algorithm_id:06X}: not present in the firmware offset table")]
    UnknownAlgorithm { algorithm_id: u32 },

    #[error("Unresolved address: no {region}/{width} entry in the memory map (offset 0x{offset:X})")]
    UnresolvedAddress {
        region: MemoryRegion,
        width: DataWidth,
        offset: u32,
    },

    #[error("Address overflow: 0x{base:08X} + 0x{offset:X} exceeds 32 bits")]
    AddressOverflow { base: u32, offset: u64 },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),
}
