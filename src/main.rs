//! huella CLI
//!
//! Symbolic PTX/SASS memory-access analyzer. The core never touches files
//! or picks a dialect on its own; this binary is the caller that does
//! both, then hands the report to a formatter.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use huella::lower::{Lowering, PtxLowering, SassLowering};
use huella::report::KernelReport;
use huella::simulate::{LaunchConfig, DEFAULT_ELEMENT_COUNT};
use huella::{write_report, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dialect {
    /// Portable virtual ISA text
    Ptx,
    /// Vendor machine ISA disassembly
    Sass,
}

#[derive(Parser)]
#[command(name = "huella")]
#[command(author, version, about = "Symbolic PTX/SASS memory-access analyzer")]
#[command(long_about = "
Reconstructs the per-thread store addresses of a straight-line GPU kernel
from its assembly text, derives the closed-form address expression, and
scores warp coalescing, stride regularity, and footprint efficiency.
")]
struct Cli {
    /// Kernel assembly file to analyze ('-' reads stdin)
    #[arg(value_name = "FILE")]
    input: String,

    /// Assembly dialect; defaults to ptx for .ptx files, sass otherwise
    #[arg(short, long, value_enum)]
    dialect: Option<Dialect>,

    /// Grid dimension (number of blocks)
    #[arg(long, default_value = "4")]
    grid: u32,

    /// Block dimension (threads per block)
    #[arg(long, default_value = "128")]
    block: u32,

    /// Base address of the output buffer (hex or decimal)
    #[arg(long, default_value = "0x1000", value_parser = parse_int)]
    base: u64,

    /// Element count seeded into the kernel's size parameter
    #[arg(long, default_value_t = DEFAULT_ELEMENT_COUNT)]
    elements: i64,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    json_out: Option<String>,
}

fn parse_int(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid integer '{s}': {e}"))
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> huella::Result<()> {
    let (text, kernel_name) = read_input(&cli.input)?;

    let dialect = cli.dialect.unwrap_or_else(|| {
        if cli.input.ends_with(".ptx") {
            Dialect::Ptx
        } else {
            Dialect::Sass
        }
    });
    let lowering: Box<dyn Lowering> = match dialect {
        Dialect::Ptx => Box::new(PtxLowering::new()),
        Dialect::Sass => Box::new(SassLowering::new()),
    };

    let launch =
        LaunchConfig::new(cli.grid, cli.block, cli.base).with_element_count(cli.elements);
    let lowered = lowering.lower(&text);
    let report = KernelReport::build(kernel_name, lowering.dialect_name(), &lowered, &launch);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    write_report(&report, format)?;

    if let Some(path) = &cli.json_out {
        fs::write(path, huella::format_json(&report)?)?;
        eprintln!("Report written to {}", path);
    }

    Ok(())
}

fn read_input(input: &str) -> huella::Result<(String, String)> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok((text, "stdin".to_string()));
    }

    let text = fs::read_to_string(input)?;
    let name = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kernel".to_string());
    Ok((text, name))
}
