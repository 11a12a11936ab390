//! Machine-ISA (SASS) lowering
//!
//! Matches fixed instruction-text patterns from disassembled machine code
//! and rewrites each into one or more virtual-ISA-shaped IR nodes, so the
//! rest of the pipeline never knows which dialect it came from.
//!
//! Predicated instructions (`@P0 ...`, `@!PT ...`) and control flow
//! (`EXIT`, `BRA`) are recognized and dropped: the analyzer models one
//! straight-line path per kernel. Constant-bank operands resolve through a
//! [`ConstBankMap`] supplied by the caller; unknown offsets lower to a
//! `cmem_<hex>` placeholder so they stay traceable in the output.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use super::{LoweredKernel, Lowering};
use crate::ir::{Instruction, Operand};

/// Constant-bank offset table: which `c[0x0][<offset>]` slot means what.
///
/// Fixed knowledge about one compiled kernel shape, passed in by value so
/// different kernel layouts can supply different tables.
#[derive(Debug, Clone)]
pub struct ConstBankMap {
    table: HashMap<u64, String>,
}

impl ConstBankMap {
    /// The layout observed for the single-store write kernel: block
    /// dimension at 0x0, the output pointer at 0x28/0x160, element count
    /// at 0x168.
    #[must_use]
    pub fn write_kernel_defaults() -> Self {
        let mut table = HashMap::new();
        table.insert(0x0, "ntid.x".to_string());
        table.insert(0x28, "out".to_string());
        table.insert(0x160, "out".to_string());
        table.insert(0x168, "input_size".to_string());
        Self { table }
    }

    /// Add or override one offset binding
    #[must_use]
    pub fn with_binding(mut self, offset: u64, name: impl Into<String>) -> Self {
        self.table.insert(offset, name.into());
        self
    }

    /// Translate an offset into its symbolic name, or a `cmem_<hex>`
    /// placeholder for offsets the table does not know.
    #[must_use]
    pub fn alias(&self, offset: u64) -> String {
        self.table
            .get(&offset)
            .cloned()
            .unwrap_or_else(|| format!("cmem_{offset:x}"))
    }
}

impl Default for ConstBankMap {
    fn default() -> Self {
        Self::write_kernel_defaults()
    }
}

/// Lowering pass for the vendor machine ISA
#[derive(Debug, Clone)]
pub struct SassLowering {
    const_bank: ConstBankMap,
}

impl SassLowering {
    /// Machine front end with the write-kernel constant-bank layout
    #[must_use]
    pub fn new() -> Self {
        Self::with_const_bank(ConstBankMap::write_kernel_defaults())
    }

    /// Machine front end with an explicit constant-bank layout
    #[must_use]
    pub fn with_const_bank(const_bank: ConstBankMap) -> Self {
        Self { const_bank }
    }
}

impl Default for SassLowering {
    fn default() -> Self {
        Self::new()
    }
}

struct Patterns {
    leading_comment: Regex,
    imad_mov_cmem: Regex,
    imad_mov_imm: Regex,
    ldc: Regex,
    prmt: Regex,
    isetp: Regex,
    fsel: Regex,
    stg: Regex,
    exit_bra: Regex,
    mov_cmem: Regex,
    mov_imm: Regex,
    s2r: Regex,
    imad: Regex,
    imad_wide: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            leading_comment: Regex::new(r"^\s*/\*.*?\*/\s*").unwrap(),
            imad_mov_cmem: Regex::new(
                r"(?i)^IMAD\.MOV\.U32\s+R(\d+),\s*RZ,\s*RZ,\s*c\[0x0\]\[0x([0-9a-f]+)\]",
            )
            .unwrap(),
            imad_mov_imm: Regex::new(
                r"(?i)^IMAD\.MOV\.U32\s+R(\d+),\s*RZ,\s*RZ,\s*0x([0-9a-f]+)",
            )
            .unwrap(),
            ldc: Regex::new(r"(?i)^LDC\.U16\s+R(\d+),\s*c\[0x0\]\[0x([0-9a-f]+)\]").unwrap(),
            prmt: Regex::new(r"(?i)^PRMT\s+R(\d+),\s*R(\d+),\s*0x[0-9a-f]+,\s*RZ").unwrap(),
            isetp: Regex::new(r"(?i)^ISETP\.(GT|NE)\.AND\s+P\d+,\s*PT,").unwrap(),
            fsel: Regex::new(r"(?i)^FSEL\s+R(\d+),\s*RZ,\s*([0-9]+),\s*P\d+").unwrap(),
            stg: Regex::new(r"(?i)^STG[.\w]*\s+\[R(\d+)\],\s*R(\d+)").unwrap(),
            exit_bra: Regex::new(r"(?i)^(EXIT|BRA)\b").unwrap(),
            mov_cmem: Regex::new(r"(?i)^MOV\s+R(\d+),\s*c\[0x0\]\[0x([0-9a-f]+)\]").unwrap(),
            mov_imm: Regex::new(r"(?i)^MOV\s+R(\d+),\s*0x([0-9a-f]+)").unwrap(),
            s2r: Regex::new(r"(?i)^S2R\s+R(\d+),\s*SR_(\w+)\.(\w+)").unwrap(),
            imad: Regex::new(r"(?i)^IMAD\s+R(\d+),\s*R(\d+),\s*c\[0x0\]\[0x([0-9a-f]+)\],\s*R(\d+)")
                .unwrap(),
            imad_wide: Regex::new(
                r"(?i)^IMAD\.WIDE\s+R(\d+),\s*R(\d+),\s*R(\d+),\s*c\[0x0\]\[0x([0-9a-f]+)\]",
            )
            .unwrap(),
        }
    }
}

const HEADER_PREFIXES: &[&str] = &["//", ".", "arch", "code", "host", "compile_size", "=", "Function"];

impl Lowering for SassLowering {
    fn dialect_name(&self) -> &str {
        "SASS"
    }

    fn lower(&self, text: &str) -> LoweredKernel {
        let p = Patterns::compile();
        let mut out = LoweredKernel::default();

        for raw in text.lines() {
            // the disassembly decorates each line with an address comment
            // and a trailing `;` terminator
            let line = raw.split(';').next().unwrap_or("");
            let line = p.leading_comment.replace(line, "");
            let line = line.trim();
            if line.is_empty() || HEADER_PREFIXES.iter().any(|pfx| line.starts_with(pfx)) {
                continue;
            }

            match self.match_line(&p, line) {
                Some(nodes) => out.instructions.extend(nodes),
                None => out.skipped.push(line.to_string()),
            }
        }

        debug!(
            lowered = out.instructions.len(),
            skipped = out.skipped.len(),
            "lowered SASS kernel"
        );
        out
    }
}

impl SassLowering {
    /// Match one cleaned line. `Some(vec![])` means recognized and
    /// intentionally dropped; `None` means no pattern matched.
    fn match_line(&self, p: &Patterns, line: &str) -> Option<Vec<Instruction>> {
        // predicate-guarded instructions are off the straight-line path
        if line.starts_with('@') {
            return Some(vec![]);
        }

        if let Some(cap) = p.imad_mov_cmem.captures(line) {
            let offset = u64::from_str_radix(&cap[2], 16).ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::reg(self.const_bank.alias(offset)),
            }]);
        }

        if let Some(cap) = p.imad_mov_imm.captures(line) {
            let imm = i64::from_str_radix(&cap[2], 16).ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::Imm(imm),
            }]);
        }

        if let Some(cap) = p.ldc.captures(line) {
            let offset = u64::from_str_radix(&cap[2], 16).ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::reg(self.const_bank.alias(offset)),
            }]);
        }

        if let Some(cap) = p.prmt.captures(line) {
            // byte permute used as a plain copy here
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::reg(format!("r{}", &cap[2])),
            }]);
        }

        if p.isetp.is_match(line) {
            // feeds only predicated instructions, which are dropped too
            return Some(vec![]);
        }

        if let Some(cap) = p.fsel.captures(line) {
            // float-select collapses to its immediate operand: the
            // predicate only guards values this path never diverges on
            let imm: i64 = cap[2].parse().ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::Imm(imm),
            }]);
        }

        if let Some(cap) = p.stg.captures(line) {
            return Some(vec![Instruction::StoreGlobal {
                addr: format!("r{}", &cap[1]),
                val: Some(Operand::reg(format!("r{}", &cap[2]))),
            }]);
        }

        if p.exit_bra.is_match(line) {
            return Some(vec![]);
        }

        if let Some(cap) = p.mov_cmem.captures(line) {
            let offset = u64::from_str_radix(&cap[2], 16).ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::reg(self.const_bank.alias(offset)),
            }]);
        }

        if let Some(cap) = p.mov_imm.captures(line) {
            let imm = i64::from_str_radix(&cap[2], 16).ok()?;
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::Imm(imm),
            }]);
        }

        if let Some(cap) = p.s2r.captures(line) {
            let sr = format!(
                "{}.{}",
                cap[2].to_lowercase(),
                cap[3].to_lowercase()
            );
            return Some(vec![Instruction::Move {
                dst: format!("r{}", &cap[1]),
                src: Operand::reg(sr),
            }]);
        }

        if let Some(cap) = p.imad.captures(line) {
            let offset = u64::from_str_radix(&cap[3], 16).ok()?;
            return Some(vec![Instruction::MultiplyAdd {
                dst: format!("r{}", &cap[1]),
                src1: Operand::reg(format!("r{}", &cap[2])),
                src2: Operand::reg(self.const_bank.alias(offset)),
                src3: Operand::reg(format!("r{}", &cap[4])),
            }]);
        }

        if let Some(cap) = p.imad_wide.captures(line) {
            // one machine op, two IR nodes: a widening multiply then the
            // 64-bit base add against the constant-bank pointer
            let dst = format!("r{}", &cap[1]);
            let offset = u64::from_str_radix(&cap[4], 16).ok()?;
            return Some(vec![
                Instruction::MultiplyWide {
                    dst: dst.clone(),
                    src1: Operand::reg(format!("r{}", &cap[2])),
                    src2: Operand::reg(format!("r{}", &cap[3])),
                },
                Instruction::Add64 {
                    dst: dst.clone(),
                    src1: Operand::reg(dst),
                    src2: Operand::reg(self.const_bank.alias(offset)),
                },
            ]);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITE_KERNEL_SASS: &str = r#"
        code for sm_86
                Function : write_kernel
        .headerflags    @"EF_CUDA_TEXMODE_UNIFIED EF_CUDA_64BIT_ADDRESS"
        /*0000*/                   IMAD.MOV.U32 R1, RZ, RZ, c[0x0][0x28] ;
        /*0010*/                   S2R R0, SR_CTAID.X ;
        /*0020*/                   S2R R3, SR_TID.X ;
        /*0030*/                   IMAD R0, R0, c[0x0][0x0], R3 ;
        /*0040*/                   ISETP.GT.AND P0, PT, R0, 0x3ff, PT ;
        /*0050*/        @P0        BRA 0xd0 ;
        /*0060*/                   MOV R7, 0x4 ;
        /*0070*/                   IMAD.MOV.U32 R5, RZ, RZ, 0x3f800000 ;
        /*0080*/                   IMAD.WIDE R2, R0, R7, c[0x0][0x160] ;
        /*0090*/                   STG.E.SYS [R2], R5 ;
        /*00d0*/                   EXIT ;
        /*00e0*/                   BRA 0xe0;
"#;

    #[test]
    fn test_lower_write_kernel_sequence() {
        let lowered = SassLowering::new().lower(WRITE_KERNEL_SASS);
        let ir = &lowered.instructions;
        // IMAD.WIDE expands to two nodes; predicated/control lines drop
        assert_eq!(ir.len(), 9);
        assert_eq!(
            ir[0],
            Instruction::Move {
                dst: "r1".into(),
                src: Operand::reg("out")
            }
        );
        assert_eq!(
            ir[1],
            Instruction::Move {
                dst: "r0".into(),
                src: Operand::reg("ctaid.x")
            }
        );
        assert_eq!(
            ir[3],
            Instruction::MultiplyAdd {
                dst: "r0".into(),
                src1: Operand::reg("r0"),
                src2: Operand::reg("ntid.x"),
                src3: Operand::reg("r3"),
            }
        );
        assert_eq!(
            ir[6],
            Instruction::MultiplyWide {
                dst: "r2".into(),
                src1: Operand::reg("r0"),
                src2: Operand::reg("r7"),
            }
        );
        assert_eq!(
            ir[7],
            Instruction::Add64 {
                dst: "r2".into(),
                src1: Operand::reg("r2"),
                src2: Operand::reg("out"),
            }
        );
        assert_eq!(
            ir[8],
            Instruction::StoreGlobal {
                addr: "r2".into(),
                val: Some(Operand::reg("r5")),
            }
        );
    }

    #[test]
    fn test_predicated_and_control_flow_dropped_silently() {
        let lowered = SassLowering::new().lower(WRITE_KERNEL_SASS);
        // recognized drops are not "skipped": the line matched a pattern
        assert_eq!(lowered.skipped_count(), 0);
    }

    #[test]
    fn test_immediate_mov_parses_hex() {
        let lowered = SassLowering::new().lower("IMAD.MOV.U32 R5, RZ, RZ, 0x3f800000 ;");
        assert_eq!(
            lowered.instructions[0],
            Instruction::Move {
                dst: "r5".into(),
                src: Operand::Imm(0x3f80_0000)
            }
        );
    }

    #[test]
    fn test_unknown_cmem_offset_gets_placeholder() {
        let lowered = SassLowering::new().lower("MOV R4, c[0x0][0x1a0] ;");
        assert_eq!(
            lowered.instructions[0],
            Instruction::Move {
                dst: "r4".into(),
                src: Operand::reg("cmem_1a0")
            }
        );
    }

    #[test]
    fn test_const_bank_table_is_caller_supplied() {
        let table = ConstBankMap::write_kernel_defaults().with_binding(0x1a0, "out");
        let lowered =
            SassLowering::with_const_bank(table).lower("MOV R4, c[0x0][0x1a0] ;");
        assert_eq!(
            lowered.instructions[0],
            Instruction::Move {
                dst: "r4".into(),
                src: Operand::reg("out")
            }
        );
    }

    #[test]
    fn test_ldc_and_prmt_lower_to_moves() {
        let text = "LDC.U16 R2, c[0x0][0x0] ;\nPRMT R6, R2, 0x5410, RZ ;";
        let lowered = SassLowering::new().lower(text);
        assert_eq!(
            lowered.instructions[0],
            Instruction::Move {
                dst: "r2".into(),
                src: Operand::reg("ntid.x")
            }
        );
        assert_eq!(
            lowered.instructions[1],
            Instruction::Move {
                dst: "r6".into(),
                src: Operand::reg("r2")
            }
        );
    }

    #[test]
    fn test_fsel_collapses_to_immediate_move() {
        let lowered = SassLowering::new().lower("FSEL R5, RZ, 1065353216, P0 ;");
        assert_eq!(
            lowered.instructions[0],
            Instruction::Move {
                dst: "r5".into(),
                src: Operand::Imm(1065353216)
            }
        );
    }

    #[test]
    fn test_unmatched_instruction_listed_as_skipped() {
        let lowered = SassLowering::new().lower("DADD R4, R2, R8 ;");
        assert!(lowered.instructions.is_empty());
        assert_eq!(lowered.skipped, vec!["DADD R4, R2, R8".to_string()]);
    }
}
