//! WMFW-Core: HALO DSP firmware and calibration container conversion.
//!
//! Turns a firmware container (WMFW) and any number of calibration
//! containers (WMDR, "BIN") into absolute-address block lists, a symbolic
//! control list and metadata text for downstream exporters.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Container**: WMFW/WMDR parsing into typed blocks
//! - **Memory Map / Resolver**: per-part address translation
//! - **Block List**: resolved blocks and transaction-size chunking
//! - **Controls**: coefficient naming and addressing
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//! - **Export**: output formats
//!
//! # Example
//!
//! ```no_run
//! use wmfw_core::{ConversionConfig, ConversionSession, MemoryMapTable};
//!
//! let config = ConversionConfig {
//!     part_number: "cs35l41".to_string(),
//!     firmware_path: Some("cs35l41.wmfw".into()),
//!     calibration_paths: vec!["cs35l41_tune.bin".into()],
//!     ..Default::default()
//! };
//!
//! let maps = MemoryMapTable::builtin().expect("built-in memory maps");
//! let session = ConversionSession::new(config, maps);
//! let output = session.run().expect("conversion failed");
//! println!("{} firmware blocks", output.firmware_blocks.len());
//! ```

pub mod block_list;
pub mod config;
pub mod container;
pub mod controls;
pub mod error;
pub mod events;
pub mod export;
pub mod memory_map;
pub mod resolver;
pub mod session;

// Re-exports for convenience
pub use block_list::{BlockList, ChunkIterator, ResolvedBlock, data_block_address};
pub use config::{ConversionConfig, DEFAULT_BLOCK_SIZE_LIMIT, MAX_BLOCK_SIZE_LIMIT};
pub use container::{
    Block, CalibrationContainer, ContainerId, FirmwareContainer, FirmwareIdBlock, FormatError,
};
pub use controls::{AlgorithmNaming, Control, assemble_controls};
pub use error::{ConfigError, ConvertError};
pub use events::{ConvertEvent, ConvertObserver, ConvertPhase, NullObserver, TracingObserver};
pub use export::{Exporter, JsonExporter, SummaryExporter, exporter_for};
pub use memory_map::{DataWidth, MemoryMap, MemoryMapTable, MemoryRegion};
pub use resolver::AddressResolver;
pub use session::{ConversionOutput, ConversionSession, RunAttributes};
