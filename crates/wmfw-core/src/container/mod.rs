//! Container module - WMFW firmware and WMDR calibration containers.

pub mod block;
pub mod calibration;
pub mod constants;
pub mod error;
pub mod firmware;
mod reader;

#[cfg(test)]
pub(crate) mod testutil;

pub use block::{
    AlgorithmEntry, AlgorithmInfoBlock, Block, BlockHeader, BlockOwner, BlockType,
    CoefficientDescriptor, ContainerId, DataBlock, FirmwareIdBlock, OffsetTable, TextBlock,
};
pub use calibration::{CalibrationContainer, CalibrationHeader};
pub use error::FormatError;
pub use firmware::{FirmwareContainer, FirmwareHeader};
