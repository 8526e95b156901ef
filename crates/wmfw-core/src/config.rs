//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controls::AlgorithmNaming;
use crate::error::ConfigError;

/// Largest payload a single control port transaction may carry.
pub const MAX_BLOCK_SIZE_LIMIT: usize = 4140;

pub const DEFAULT_BLOCK_SIZE_LIMIT: usize = MAX_BLOCK_SIZE_LIMIT;

pub const DEFAULT_I2C_ADDRESS: &str = "0x80";

/// Inputs of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Target part, e.g. `cs35l41`.
    pub part_number: String,
    /// Firmware container (WMFW).
    pub firmware_path: Option<PathBuf>,
    /// Calibration containers (WMDR), in run order.
    pub calibration_paths: Vec<PathBuf>,
    /// Maximum bytes per resolved block.
    pub block_size_limit: usize,
    /// Suffix appended to exported names; stored without the leading `_`.
    pub suffix: String,
    /// Symbol table header to read ids from.
    pub symbol_id_input: Option<PathBuf>,
    /// Symbol table header to generate.
    pub symbol_id_output: Option<PathBuf>,
    /// Control port address used by debugger scripts.
    pub i2c_address: String,
    /// Request packed binary image output.
    pub binary_output: bool,
    /// Packed images carry calibration data only.
    pub wmdr_only: bool,
    pub naming: AlgorithmNaming,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            part_number: String::new(),
            firmware_path: None,
            calibration_paths: Vec::new(),
            block_size_limit: DEFAULT_BLOCK_SIZE_LIMIT,
            suffix: String::new(),
            symbol_id_input: None,
            symbol_id_output: None,
            i2c_address: DEFAULT_I2C_ADDRESS.to_string(),
            binary_output: false,
            wmdr_only: false,
            naming: AlgorithmNaming::default(),
        }
    }
}

impl ConversionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ConversionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check settings that do not need the input files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.part_number.is_empty() {
            return Err(ConfigError::Missing("part_number"));
        }
        if self.firmware_path.is_none() {
            return Err(ConfigError::Missing("firmware_path"));
        }
        self.validate_block_size()
    }

    /// The limit must be between 1 and [`MAX_BLOCK_SIZE_LIMIT`].
    pub fn validate_block_size(&self) -> Result<(), ConfigError> {
        if self.block_size_limit == 0 || self.block_size_limit > MAX_BLOCK_SIZE_LIMIT {
            return Err(ConfigError::BlockSizeLimit {
                limit: self.block_size_limit,
                max: MAX_BLOCK_SIZE_LIMIT,
            });
        }
        Ok(())
    }

    /// Suffix as used in exported names: empty, or `_` followed by the suffix.
    pub fn name_suffix(&self) -> String {
        if self.suffix.is_empty() {
            String::new()
        } else {
            format!("_{}", self.suffix)
        }
    }
}
