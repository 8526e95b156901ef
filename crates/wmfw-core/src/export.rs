//! Exporters turn a conversion output into a document.
//!
//! C sources, packed images and debugger scripts are produced by exporters
//! outside this crate through the same trait.

use std::fmt::Write;

use crate::error::ConvertError;
use crate::session::ConversionOutput;

pub trait Exporter {
    /// Command name the exporter is selected by.
    fn name(&self) -> &str;

    fn export(&self, output: &ConversionOutput) -> Result<String, ConvertError>;
}

/// Human readable description of the parsed containers and resolved
/// artifacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryExporter;

impl Exporter for SummaryExporter {
    fn name(&self) -> &str {
        "print"
    }

    fn export(&self, output: &ConversionOutput) -> Result<String, ConvertError> {
        let mut s = String::new();
        write_summary(&mut s, output)?;
        Ok(s)
    }
}

fn write_summary<W: Write>(s: &mut W, output: &ConversionOutput) -> std::fmt::Result {
    let attrs = &output.attributes;

    writeln!(s, "WMFW File: {}", output.firmware_path.display())?;
    writeln!(s, "{}", output.firmware)?;
    for calibration in &output.calibrations {
        writeln!(s, "WMDR File: {}", calibration.path.display())?;
        writeln!(s, "{}", calibration.container)?;
    }

    writeln!(s, "Part Number: {}", attrs.part_number)?;
    writeln!(
        s,
        "Firmware: id 0x{:06X} revision 0x{:06X}",
        attrs.firmware_id, attrs.firmware_revision
    )?;
    writeln!(s, "Block size limit: {} bytes", attrs.block_size_limit)?;
    writeln!(
        s,
        "Firmware blocks: {} ({} bytes)",
        attrs.firmware_block_count,
        output.firmware_blocks.iter().map(|b| b.len()).sum::<usize>()
    )?;
    for (index, blocks) in output.calibration_blocks.iter().enumerate() {
        writeln!(
            s,
            "Calibration blocks [{}]: {} ({} bytes)",
            index,
            blocks.len(),
            blocks.iter().map(|b| b.len()).sum::<usize>()
        )?;
    }

    writeln!(s, "Controls: {}", output.controls.len())?;
    for control in &output.controls {
        writeln!(
            s,
            "  0x{:08X}  {:<32} (alg 0x{:06X})",
            control.address, control.control_name, control.algorithm_id
        )?;
    }
    Ok(())
}

/// Pretty JSON document of the attributes, blocks, controls and metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    fn export(&self, output: &ConversionOutput) -> Result<String, ConvertError> {
        Ok(serde_json::to_string_pretty(output)?)
    }
}

/// Exporter bundled for `name`, if any.
pub fn exporter_for(name: &str) -> Option<Box<dyn Exporter>> {
    match name {
        "print" => Some(Box::new(SummaryExporter)),
        "json" => Some(Box::new(JsonExporter)),
        _ => None,
    }
}
