//! Integration tests for huella
//!
//! Drives the whole pipeline over the bundled write-kernel fixtures, in
//! both dialects, and checks the hardware-level verdicts end to end.

use std::collections::HashMap;
use std::process::Command;

use huella::lower::{Lowering, PtxLowering, SassLowering};
use huella::report::KernelReport;
use huella::simulate::{simulate, LaunchConfig};
use huella::symbolic::symbolic_address;
use huella::AccessPattern;

const WRITE_KERNEL_PTX: &str = include_str!("../data/write_kernel.ptx");
const WRITE_KERNEL_SASS: &str = include_str!("../data/write_kernel.sass");

fn ptx_report(grid: u32, block: u32, base: u64) -> KernelReport {
    let lowered = PtxLowering::new().lower(WRITE_KERNEL_PTX);
    let launch = LaunchConfig::new(grid, block, base);
    KernelReport::build("write_kernel", "PTX", &lowered, &launch)
}

fn sass_report(grid: u32, block: u32, base: u64) -> KernelReport {
    let lowered = SassLowering::new().lower(WRITE_KERNEL_SASS);
    let launch = LaunchConfig::new(grid, block, base);
    KernelReport::build("write_kernel", "SASS", &lowered, &launch)
}

#[test]
fn ptx_write_kernel_end_to_end() {
    let report = ptx_report(4, 128, 0x1000);

    assert_eq!(report.accesses.len(), 512);
    assert_eq!(report.warp_stats.len(), 16);
    assert!(report.warp_stats.iter().all(|w| w.fully_utilized));
    assert!(report.warp_stats.iter().all(|w| w.contiguous));
    assert!(report.warp_stats.iter().all(|w| w.coalesced));

    assert_eq!(report.address_ranges.len(), 1);
    assert_eq!(report.address_ranges[0].start, 0x1000);
    assert_eq!(report.address_ranges[0].end, 0x1000 + 512 * 4);

    assert_eq!(report.stride.stride, Some(4));
    assert_eq!(report.stride.pattern, AccessPattern::UnitStrided);
    assert_eq!(report.stride.density, Some(1.0));

    assert_eq!(report.footprint.footprint_bytes, 2048);
    assert_eq!(report.footprint.used_bytes, 2048);
    assert_eq!(report.footprint.wasted_bytes, 0);
    assert_eq!(report.footprint.efficiency, 1.0);
}

#[test]
fn sass_write_kernel_end_to_end() {
    let report = sass_report(4, 128, 0x1000);

    assert_eq!(report.accesses.len(), 512);
    assert_eq!(report.warp_stats.len(), 16);
    assert!(report.warp_stats.iter().all(|w| w.coalesced));

    // the machine kernel stores an immediate, so every access records it
    assert_eq!(report.memory_writes.len(), 512);
    assert!(report
        .memory_writes
        .iter()
        .all(|w| w.written_value == 0x3f80_0000));
    for (i, write) in report.memory_writes.iter().enumerate() {
        assert_eq!(write.thread_id, i as u64);
        assert_eq!(write.word_offset, Some(i as i64));
    }
}

#[test]
fn dialects_agree_on_the_address_set() {
    let ptx = ptx_report(4, 128, 0x1000);
    let sass = sass_report(4, 128, 0x1000);

    let ptx_addrs: Vec<u64> = ptx.accesses.iter().map(|a| a.address).collect();
    let sass_addrs: Vec<u64> = sass.accesses.iter().map(|a| a.address).collect();
    assert_eq!(ptx_addrs, sass_addrs);
    assert_eq!(ptx.footprint, sass.footprint);
    assert_eq!(ptx.stride, sass.stride);
}

#[test]
fn access_count_matches_thread_count_across_geometries() {
    for (grid, block) in [(1, 512), (2, 256), (4, 128), (8, 64), (512, 1)] {
        let report = ptx_report(grid, block, 0x1000);
        assert_eq!(
            report.accesses.len(),
            512,
            "grid={grid} block={block} should emit one access per thread"
        );
    }
}

#[test]
fn misaligned_base_defeats_warp_coalescing() {
    // shifting the buffer off the 128-byte boundary by one word keeps the
    // accesses contiguous but breaks the segment-alignment rule
    let report = ptx_report(4, 128, 0x1004);
    assert!(report.warp_stats.iter().all(|w| w.contiguous));
    assert!(report.warp_stats.iter().all(|w| !w.coalesced));
}

#[test]
fn simulation_is_reproducible_byte_for_byte() {
    let a = serde_json::to_string(&ptx_report(4, 128, 0x1000)).unwrap();
    let b = serde_json::to_string(&ptx_report(4, 128, 0x1000)).unwrap();
    assert_eq!(a, b);

    let c = serde_json::to_string(&sass_report(4, 128, 0x1000)).unwrap();
    let d = serde_json::to_string(&sass_report(4, 128, 0x1000)).unwrap();
    assert_eq!(c, d);
}

#[test]
fn symbolic_expression_matches_concrete_simulation() {
    for (dialect, text) in [
        ("ptx", WRITE_KERNEL_PTX),
        ("sass", WRITE_KERNEL_SASS),
    ] {
        let lowered: huella::LoweredKernel = match dialect {
            "ptx" => PtxLowering::new().lower(text),
            _ => SassLowering::new().lower(text),
        };
        let expr = symbolic_address(&lowered.instructions)
            .unwrap_or_else(|| panic!("{dialect}: kernel has a store"));

        let launch = LaunchConfig::new(3, 64, 0x2000);
        let accesses = simulate(&lowered.instructions, &launch);
        assert!(!accesses.is_empty());

        for access in accesses.iter().step_by(17) {
            let mut bindings = HashMap::new();
            bindings.insert("ctaid.x", i64::from(access.block_idx));
            bindings.insert("ntid.x", i64::from(launch.block_dim_x));
            bindings.insert("tid.x", i64::from(access.thread_idx));
            bindings.insert("out", launch.base_address as i64);
            let predicted = eval_formula(&expr, &bindings);
            assert_eq!(
                predicted, access.address as i64,
                "{dialect}: formula {expr} disagrees for thread {}",
                access.global_idx
            );
        }
    }
}

#[test]
fn cli_analyzes_fixture_to_json() {
    let output = Command::new(env!("CARGO_BIN_EXE_huella"))
        .args([
            "data/write_kernel.ptx",
            "--grid",
            "4",
            "--block",
            "128",
            "--base",
            "0x1000",
            "--json",
        ])
        .output()
        .expect("failed to run huella");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(json["kernel"], "write_kernel");
    assert_eq!(json["dialect"], "PTX");
    assert_eq!(json["num_threads"], 512);
    assert_eq!(json["num_warps"], 16);
    assert_eq!(json["base_address"], 0x1000);
    assert_eq!(json["warp_stats"].as_array().unwrap().len(), 16);
}

#[test]
fn cli_help_mentions_launch_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_huella"))
        .arg("--help")
        .output()
        .expect("failed to run huella");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--grid", "--block", "--base", "--dialect", "--json"] {
        assert!(stdout.contains(flag), "help should mention {flag}");
    }
}

// ----------------------------------------------------------------------
// A minimal interpreter for the emitted address formulas, so the symbolic
// result can be checked numerically against the simulator.
// ----------------------------------------------------------------------

fn eval_formula(expr: &str, bindings: &HashMap<&str, i64>) -> i64 {
    let tokens = tokenize(expr);
    let mut pos = 0;
    let value = parse_sum(&tokens, &mut pos, bindings);
    assert_eq!(pos, tokens.len(), "trailing tokens in {expr}");
    value
}

#[derive(Debug, PartialEq)]
enum Token {
    Num(i64),
    Sym(String),
    Plus,
    Star,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            _ if c.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        n.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(n.parse().unwrap()));
            }
            _ => {
                let mut s = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '.' || d == '_' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                assert!(!s.is_empty(), "unexpected character {c:?} in formula");
                tokens.push(Token::Sym(s));
            }
        }
    }
    tokens
}

fn parse_sum(tokens: &[Token], pos: &mut usize, bindings: &HashMap<&str, i64>) -> i64 {
    let mut value = parse_product(tokens, pos, bindings);
    while tokens.get(*pos) == Some(&Token::Plus) {
        *pos += 1;
        value += parse_product(tokens, pos, bindings);
    }
    value
}

fn parse_product(tokens: &[Token], pos: &mut usize, bindings: &HashMap<&str, i64>) -> i64 {
    let mut value = parse_atom(tokens, pos, bindings);
    while tokens.get(*pos) == Some(&Token::Star) {
        *pos += 1;
        value *= parse_atom(tokens, pos, bindings);
    }
    value
}

fn parse_atom(tokens: &[Token], pos: &mut usize, bindings: &HashMap<&str, i64>) -> i64 {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => {
            *pos += 1;
            *n
        }
        Some(Token::Sym(s)) => {
            *pos += 1;
            *bindings
                .get(s.as_str())
                .unwrap_or_else(|| panic!("unbound symbol {s}"))
        }
        Some(Token::Open) => {
            *pos += 1;
            let value = parse_sum(tokens, pos, bindings);
            assert_eq!(tokens.get(*pos), Some(&Token::Close), "missing ')'");
            *pos += 1;
            value
        }
        other => panic!("unexpected token {other:?}"),
    }
}
