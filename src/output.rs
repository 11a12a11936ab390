//! Output formatters
//!
//! Colored text for terminals, pretty JSON for tooling. The text view is
//! where addresses become hex; the JSON view keeps them as integers.

use colored::Colorize;
use std::io::{self, Write};

use crate::access::AccessPattern;
use crate::report::KernelReport;

/// Output format options
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Colored text output for terminal
    #[default]
    Text,
    /// JSON output for tooling and CI
    Json,
}

/// Number of coalesced ranges printed before eliding the rest
const MAX_RANGES_SHOWN: usize = 8;

/// Format a kernel report as colored text for the terminal
#[must_use]
pub fn format_text(report: &KernelReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} Memory Analysis: {}\n",
        report.dialect.cyan().bold(),
        report.kernel.white().bold()
    ));
    out.push_str(&"═".repeat(60));
    out.push('\n');

    // Launch
    out.push_str(&format!("\n{}\n", "Launch:".white().bold()));
    out.push_str(&format!(
        "  ├── Grid: {} blocks × {} threads\n",
        report.grid_dim_x, report.block_dim_x
    ));
    out.push_str(&format!(
        "  ├── Threads: {} ({} warps)\n",
        report.num_threads, report.num_warps
    ));
    out.push_str(&format!("  └── Base address: {:#x}\n", report.base_address));

    // Address pattern
    let pattern_status = match report.stride.pattern {
        AccessPattern::UnitStrided => "[OK]".green(),
        AccessPattern::Irregular => "[WARN]".yellow(),
        AccessPattern::Undetermined => "[??]".yellow(),
    };
    out.push_str(&format!(
        "\n{}                                   {}\n",
        "Address Pattern:".white().bold(),
        pattern_status
    ));
    out.push_str(&format!(
        "  ├── Expression: {}\n",
        report.address_expr.as_deref().unwrap_or("(no store)")
    ));
    out.push_str(&format!(
        "  ├── Stride: {}\n",
        match report.stride.stride {
            Some(s) => format!("{} bytes ({})", s, pattern_name(report.stride.pattern)),
            None => pattern_name(report.stride.pattern).to_string(),
        }
    ));
    out.push_str(&format!(
        "  └── Density: {}\n",
        match report.stride.density {
            Some(d) => format!("{:.1}%", d * 100.0),
            None => "n/a".to_string(),
        }
    ));

    // Footprint
    let fp = &report.footprint;
    let fp_status = if fp.efficiency >= 0.9 {
        "[OK]".green()
    } else if fp.efficiency >= 0.5 {
        "[WARN]".yellow()
    } else {
        "[BAD]".red()
    };
    out.push_str(&format!(
        "\n{}                                         {}\n",
        "Footprint:".white().bold(),
        fp_status
    ));
    out.push_str(&format!("  ├── Span: {} bytes\n", fp.footprint_bytes));
    out.push_str(&format!(
        "  ├── Used: {} bytes (wasted: {})\n",
        fp.used_bytes, fp.wasted_bytes
    ));
    out.push_str(&format!("  └── Efficiency: {:.1}%\n", fp.efficiency * 100.0));

    // Coalesced ranges
    out.push_str(&format!(
        "\n{} ({})\n",
        "Coalesced Ranges:".white().bold(),
        report.address_ranges.len()
    ));
    for (i, range) in report.address_ranges.iter().take(MAX_RANGES_SHOWN).enumerate() {
        let connector = if i + 1 == report.address_ranges.len().min(MAX_RANGES_SHOWN) {
            "└──"
        } else {
            "├──"
        };
        out.push_str(&format!(
            "  {} {:#x} - {:#x}\n",
            connector, range.start, range.end
        ));
    }
    if report.address_ranges.len() > MAX_RANGES_SHOWN {
        out.push_str(&format!(
            "      … and {} more\n",
            report.address_ranges.len() - MAX_RANGES_SHOWN
        ));
    }

    // Warps
    let full = report.warp_stats.iter().filter(|w| w.fully_utilized).count();
    let coalesced = report.warp_stats.iter().filter(|w| w.coalesced).count();
    let total = report.warp_stats.len();
    let warp_status = if total > 0 && coalesced == total {
        "[OK]".green()
    } else {
        "[WARN]".yellow()
    };
    out.push_str(&format!(
        "\n{}                                             {}\n",
        "Warps:".white().bold(),
        warp_status
    ));
    out.push_str(&format!("  ├── Fully utilized: {}/{}\n", full, total));
    out.push_str(&format!("  └── Coalesced: {}/{}\n", coalesced, total));

    if report.skipped_lines > 0 {
        out.push_str(&format!(
            "\n{} {} unrecognized line(s) dropped by the lowering\n",
            "note:".yellow(),
            report.skipped_lines
        ));
    }

    out
}

fn pattern_name(pattern: AccessPattern) -> &'static str {
    match pattern {
        AccessPattern::UnitStrided => "unit-strided",
        AccessPattern::Irregular => "irregular",
        AccessPattern::Undetermined => "undetermined",
    }
}

/// Format a kernel report as JSON
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn format_json(report: &KernelReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Write a report to stdout in the specified format
///
/// # Errors
///
/// Returns `io::Error` if writing to stdout fails or JSON serialization fails.
pub fn write_report(report: &KernelReport, format: OutputFormat) -> io::Result<()> {
    let mut stdout = io::stdout().lock();

    match format {
        OutputFormat::Text => {
            write!(stdout, "{}", format_text(report))?;
        }
        OutputFormat::Json => {
            let json = format_json(report).map_err(io::Error::other)?;
            writeln!(stdout, "{}", json)?;
        }
    }

    Ok(())
}
