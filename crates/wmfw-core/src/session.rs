//! Conversion session - orchestrates one run from container files to
//! exporter-ready artifacts.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, instrument};

use crate::block_list::{BlockList, ResolvedBlock};
use crate::config::ConversionConfig;
use crate::container::{CalibrationContainer, ContainerId, FirmwareContainer};
use crate::controls::{AlgorithmNaming, Control, assemble_controls};
use crate::error::{ConfigError, ConvertError};
use crate::events::{ConvertEvent, ConvertObserver, ConvertPhase, TracingObserver};
use crate::memory_map::MemoryMapTable;
use crate::resolver::AddressResolver;

/// Name written into the metadata text.
pub const TOOL_NAME: &str = "wmfw-convert";

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything an exporter needs to know about the run besides the blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunAttributes {
    pub part_number: String,
    pub firmware_id: u32,
    pub firmware_revision: u32,
    pub block_size_limit: usize,
    /// Empty, or `_` followed by the configured suffix.
    pub suffix: String,
    pub symbol_id_input: Option<PathBuf>,
    pub symbol_id_output: Option<PathBuf>,
    pub i2c_address: String,
    pub binary_output: bool,
    pub wmdr_only: bool,
    pub naming: AlgorithmNaming,
    pub firmware_block_count: usize,
    /// One entry per calibration container, in run order.
    pub calibration_block_counts: Vec<usize>,
}

/// A parsed calibration container and where it came from.
#[derive(Debug, Clone)]
pub struct ParsedCalibration {
    pub path: PathBuf,
    pub container: CalibrationContainer,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub attributes: RunAttributes,
    pub firmware_blocks: Vec<ResolvedBlock>,
    /// One list per calibration container, in run order.
    pub calibration_blocks: Vec<Vec<ResolvedBlock>>,
    pub controls: Vec<Control>,
    pub metadata: Vec<String>,
    #[serde(skip)]
    pub firmware_path: PathBuf,
    #[serde(skip)]
    pub firmware: FirmwareContainer,
    #[serde(skip)]
    pub calibrations: Vec<ParsedCalibration>,
}

/// Conversion session.
pub struct ConversionSession<O: ConvertObserver> {
    config: ConversionConfig,
    maps: MemoryMapTable,
    observer: Arc<O>,
    command_line: Vec<String>,
    phase: Mutex<ConvertPhase>,
}

impl ConversionSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: ConversionConfig, maps: MemoryMapTable) -> Self {
        Self::with_observer(config, maps, Arc::new(TracingObserver))
    }
}

impl<O: ConvertObserver> ConversionSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: ConversionConfig, maps: MemoryMapTable, observer: Arc<O>) -> Self {
        Self {
            config,
            maps,
            observer,
            command_line: Vec::new(),
            phase: Mutex::new(ConvertPhase::Parse),
        }
    }

    /// Arguments recorded in the metadata text.
    pub fn with_command_line<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_line = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Read every configured container and convert.
    #[instrument(skip(self), fields(part = %self.config.part_number))]
    pub fn run(&self) -> Result<ConversionOutput, ConvertError> {
        let result = self.load_and_convert();
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Convert containers already in memory. `calibrations` pairs each
    /// calibration image with the path reported in the metadata.
    pub fn convert(
        &self,
        firmware_path: &Path,
        firmware: &[u8],
        calibrations: &[(PathBuf, Vec<u8>)],
    ) -> Result<ConversionOutput, ConvertError> {
        let result = self.convert_inner(firmware_path, firmware, calibrations);
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn load_and_convert(&self) -> Result<ConversionOutput, ConvertError> {
        self.config.validate()?;
        let firmware_path = self
            .config
            .firmware_path
            .as_deref()
            .ok_or(ConfigError::Missing("firmware_path"))?;

        info!(path = %firmware_path.display(), "Loading firmware container");
        let firmware = read_file(firmware_path)?;

        let mut calibrations = Vec::with_capacity(self.config.calibration_paths.len());
        for path in &self.config.calibration_paths {
            info!(path = %path.display(), "Loading calibration container");
            calibrations.push((path.clone(), read_file(path)?));
        }

        self.convert_inner(firmware_path, &firmware, &calibrations)
    }

    fn convert_inner(
        &self,
        firmware_path: &Path,
        firmware_data: &[u8],
        calibration_data: &[(PathBuf, Vec<u8>)],
    ) -> Result<ConversionOutput, ConvertError> {
        let limit = self.config.block_size_limit;
        self.config.validate_block_size()?;

        // Parse
        self.phase(ConvertPhase::Parse);
        let firmware = FirmwareContainer::parse(firmware_data)?;
        self.observer.on_event(&ConvertEvent::ContainerParsed {
            container: ContainerId::Firmware,
            path: firmware_path.to_path_buf(),
            blocks: firmware.blocks.len(),
        });

        let mut calibrations = Vec::with_capacity(calibration_data.len());
        for (index, (path, data)) in (0u16..).zip(calibration_data) {
            let container = CalibrationContainer::parse(data, index)?;
            self.observer.on_event(&ConvertEvent::ContainerParsed {
                container: container.id,
                path: path.clone(),
                blocks: container.blocks.len(),
            });
            calibrations.push(ParsedCalibration {
                path: path.clone(),
                container,
            });
        }

        // Resolve
        self.phase(ConvertPhase::Resolve);
        let resolver = AddressResolver::new(&self.maps, &self.config.part_number)?;
        info!(
            part = resolver.part(),
            map = %resolver.memory_map().name,
            "Using memory map"
        );

        // Block layout
        self.phase(ConvertPhase::BlockLayout);
        let mut firmware_list = BlockList::firmware(&firmware, &resolver, limit)?;
        firmware_list.rehash()?;
        self.blocks_resolved(ContainerId::Firmware, &firmware_list);

        let mut calibration_lists = Vec::with_capacity(calibrations.len());
        for calibration in &calibrations {
            let mut list = BlockList::calibration(
                &calibration.container,
                firmware.firmware_id(),
                &resolver,
                limit,
            )?;
            list.rehash()?;
            self.blocks_resolved(calibration.container.id, &list);
            calibration_lists.push(list);
        }

        // Controls and metadata
        self.phase(ConvertPhase::Controls);
        let controls = assemble_controls(&firmware, &resolver, self.config.naming)?;
        self.observer.on_event(&ConvertEvent::ControlsAssembled {
            count: controls.len(),
        });
        let metadata = self.metadata_lines(&calibrations);

        let id = firmware.firmware_id();
        let attributes = RunAttributes {
            part_number: self.config.part_number.clone(),
            firmware_id: id.firmware_id,
            firmware_revision: id.firmware_revision,
            block_size_limit: firmware_list.size_limit(),
            suffix: self.config.name_suffix(),
            symbol_id_input: self.config.symbol_id_input.clone(),
            symbol_id_output: self.config.symbol_id_output.clone(),
            i2c_address: self.config.i2c_address.clone(),
            binary_output: self.config.binary_output,
            wmdr_only: self.config.wmdr_only,
            naming: self.config.naming,
            firmware_block_count: firmware_list.len(),
            calibration_block_counts: calibration_lists.iter().map(BlockList::len).collect(),
        };

        self.phase(ConvertPhase::Complete);
        self.observer.on_event(&ConvertEvent::Complete);

        Ok(ConversionOutput {
            attributes,
            firmware_blocks: firmware_list.into_blocks(),
            calibration_blocks: calibration_lists
                .into_iter()
                .map(BlockList::into_blocks)
                .collect(),
            controls,
            metadata,
            firmware_path: firmware_path.to_path_buf(),
            firmware,
            calibrations,
        })
    }

    /// Tool line, command line, then the informational text of every
    /// calibration container that has some.
    pub fn metadata_lines(&self, calibrations: &[ParsedCalibration]) -> Vec<String> {
        let mut lines = vec![
            format!("{} version: {}", TOOL_NAME, TOOL_VERSION),
            self.command_line_text(),
        ];

        for calibration in calibrations {
            let texts: Vec<_> = calibration.container.informational_text().collect();
            if texts.is_empty() {
                continue;
            }
            lines.push(format!("BIN Filename: {}", calibration.path.display()));
            lines.push("    Informational Text:".to_string());
            for text in texts {
                lines.extend(text.text.lines().map(|line| format!("    {}", line)));
            }
            lines.push(String::new());
        }

        lines
    }

    /// `Command:` followed by every argument with a leading space, so the
    /// first argument is separated by two spaces.
    fn command_line_text(&self) -> String {
        let mut line = String::from("Command: ");
        for arg in &self.command_line {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn phase(&self, to: ConvertPhase) {
        let from = match self.phase.lock() {
            Ok(mut current) => std::mem::replace(&mut *current, to),
            Err(_) => to,
        };
        self.observer.on_event(&ConvertEvent::PhaseChanged { from, to });
    }

    fn blocks_resolved(&self, container: ContainerId, list: &BlockList) {
        self.observer.on_event(&ConvertEvent::BlocksResolved {
            container,
            blocks: list.len(),
            bytes: list.total_bytes(),
        });
    }

    fn fail(&self, error: &ConvertError) {
        self.observer.on_event(&ConvertEvent::Error {
            message: error.to_string(),
        });
        self.phase(ConvertPhase::Error);
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConvertError> {
    std::fs::read(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })
}
