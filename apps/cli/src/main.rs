use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use wmfw_core::{
    AlgorithmNaming, ConversionConfig, ConversionSession, MemoryMapTable, exporter_for,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Command {
    /// Describe the parsed containers and resolved blocks
    Print,
    /// Dump the conversion output as JSON
    Json,
}

impl Command {
    fn exporter_name(self) -> &'static str {
        match self {
            Command::Print => "print",
            Command::Json => "json",
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert WMFW/WMDR (\"BIN\") containers", long_about = None)]
struct Args {
    /// Output to produce
    #[arg(value_enum)]
    command: Command,

    /// Part number the firmware targets (e.g. cs35l41)
    part_number: Option<String>,

    /// Firmware container (.wmfw)
    wmfw: Option<PathBuf>,

    /// Calibration containers (.bin)
    #[arg(long = "wmdr", num_args = 1..)]
    wmdrs: Vec<PathBuf>,

    /// Suffix for filenames, variables and defines
    #[arg(short, long)]
    suffix: Option<String>,

    /// I2C address for debugger scripts
    #[arg(short, long)]
    i2c_address: Option<String>,

    /// Maximum bytes per control port transaction (at most 4140)
    #[arg(short, long)]
    block_size_limit: Option<usize>,

    /// Symbol table C header(s) to read ids from
    #[arg(long = "sym-input")]
    symbol_id_input: Option<PathBuf>,

    /// Symbol table C header to generate
    #[arg(long = "sym-output")]
    symbol_id_output: Option<PathBuf>,

    /// Request packed binary image output
    #[arg(long = "binary")]
    binary_output: bool,

    /// Store only calibration data in packed images
    #[arg(long)]
    wmdr_only: bool,

    /// Use the generic FIRMWARE name for the firmware's own controls
    #[arg(long)]
    generic_sym: bool,

    /// Run configuration (TOML); command line options take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective run configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Memory map table (TOML) to use instead of the built-in one
    #[arg(long)]
    memory_maps: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<ConversionConfig> {
        let mut config = match &self.config {
            Some(path) => ConversionConfig::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ConversionConfig::default(),
        };

        if let Some(part) = self.part_number {
            config.part_number = part;
        }
        if let Some(wmfw) = self.wmfw {
            config.firmware_path = Some(wmfw);
        }
        if !self.wmdrs.is_empty() {
            config.calibration_paths = self.wmdrs;
        }
        if let Some(suffix) = self.suffix {
            config.suffix = suffix;
        }
        if let Some(address) = self.i2c_address {
            config.i2c_address = address;
        }
        if let Some(limit) = self.block_size_limit {
            config.block_size_limit = limit;
        }
        if self.symbol_id_input.is_some() {
            config.symbol_id_input = self.symbol_id_input;
        }
        if self.symbol_id_output.is_some() {
            config.symbol_id_output = self.symbol_id_output;
        }
        config.binary_output |= self.binary_output;
        config.wmdr_only |= self.wmdr_only;
        if self.generic_sym {
            config.naming = AlgorithmNaming::Generic;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let command = args.command;
    let output_path = args.output.clone();
    let save_config = args.save_config.clone();

    let maps = match &args.memory_maps {
        Some(path) => MemoryMapTable::load_from_file(path)
            .with_context(|| format!("Failed to load memory maps from {}", path.display()))?,
        None => MemoryMapTable::builtin()?,
    };

    let config = args.into_config()?;
    if maps.find_part(&config.part_number).is_none() {
        bail!(
            "Unsupported part number '{}' (supported: {})",
            config.part_number,
            maps.parts().collect::<Vec<_>>().join(", ")
        );
    }
    if let Some(path) = &save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!(path = %path.display(), "Saved run configuration");
    }

    info!(
        command = command.exporter_name(),
        part = %config.part_number,
        calibrations = config.calibration_paths.len(),
        "Starting conversion"
    );

    let Some(exporter) = exporter_for(command.exporter_name()) else {
        bail!("No exporter for '{}'", command.exporter_name());
    };

    let session = ConversionSession::new(config, maps).with_command_line(std::env::args());
    let output = session.run()?;
    let document = exporter.export(&output)?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote {} output", exporter.name());
        }
        None => println!("{}", document),
    }

    Ok(())
}
