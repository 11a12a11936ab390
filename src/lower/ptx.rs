//! Virtual-ISA (PTX) lowering
//!
//! Line-oriented and positional: each surviving line splits into an opcode
//! token and a comma-separated argument string, and each recognized opcode
//! family maps straight onto one IR node. Blank lines, `//` comments and
//! trailing-`:` labels are structural and skipped outright; anything else
//! that fails to match is recorded as a dropped line.

use regex::Regex;
use tracing::debug;

use super::{clean, LoweredKernel, Lowering};
use crate::ir::{CmpOp, Instruction, Operand};

/// Lowering pass for the portable virtual ISA
#[derive(Debug, Clone, Copy, Default)]
pub struct PtxLowering;

impl PtxLowering {
    /// Create the PTX front end
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Lowering for PtxLowering {
    fn dialect_name(&self) -> &str {
        "PTX"
    }

    fn lower(&self, text: &str) -> LoweredKernel {
        let store = Regex::new(r"\[([^\]]+)\]\s*,\s*(\S+)").unwrap();
        let mut out = LoweredKernel::default();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") || line.ends_with(':') {
                continue;
            }

            let Some((op, rest)) = line.split_once(char::is_whitespace) else {
                out.skipped.push(line.to_string());
                continue;
            };
            let args_str = rest.trim().trim_end_matches(';').trim();
            let args: Vec<&str> = args_str.split(',').map(clean).collect();

            let instr = if op == "ld.param.u64" {
                two(&args).map(|(dst, src)| {
                    let param = src.trim_matches(|c| c == '[' || c == ']');
                    let param = if param.ends_with("_param_0") {
                        "out".to_string()
                    } else {
                        param.to_string()
                    };
                    Instruction::LoadParam {
                        dst: dst.to_string(),
                        src: param,
                    }
                })
            } else if op == "cvta.to.global.u64" {
                two(&args).map(|(dst, src)| Instruction::ConvertToGlobal {
                    dst: dst.to_string(),
                    src: src.to_string(),
                })
            } else if op.starts_with("mov") {
                two(&args).map(|(dst, src)| Instruction::Move {
                    dst: dst.to_string(),
                    src: Operand::parse(src),
                })
            } else if op.starts_with("mad.lo.s32") {
                four(&args).map(|(dst, a, b, c)| Instruction::MultiplyAdd {
                    dst: dst.to_string(),
                    src1: Operand::parse(a),
                    src2: Operand::parse(b),
                    src3: Operand::parse(c),
                })
            } else if op.starts_with("mul.wide.s32") {
                three(&args).map(|(dst, a, b)| Instruction::MultiplyWide {
                    dst: dst.to_string(),
                    src1: Operand::parse(a),
                    src2: Operand::parse(b),
                })
            } else if op.starts_with("add.s64") {
                three(&args).map(|(dst, a, b)| Instruction::Add64 {
                    dst: dst.to_string(),
                    src1: Operand::parse(a),
                    src2: Operand::parse(b),
                })
            } else if op.starts_with("setp.eq") || op.starts_with("setp.ne") {
                let cmp = if op.starts_with("setp.eq") {
                    CmpOp::Eq
                } else {
                    CmpOp::Ne
                };
                three(&args).map(|(dst, a, b)| Instruction::SetPredicate {
                    cmp,
                    dst: dst.to_string(),
                    src1: Operand::parse(a),
                    src2: Operand::parse(b),
                })
            } else if op.starts_with("selp") {
                four(&args).map(|(dst, t, f, cond)| Instruction::Select {
                    dst: dst.to_string(),
                    cond: cond.to_string(),
                    true_val: Operand::parse(t),
                    false_val: Operand::parse(f),
                })
            } else if op.starts_with("st.global") {
                store.captures(args_str).map(|cap| Instruction::StoreGlobal {
                    addr: clean(&cap[1]).to_string(),
                    val: Some(Operand::parse(clean(&cap[2]))),
                })
            } else {
                None
            };

            match instr {
                Some(i) => out.instructions.push(i),
                None => out.skipped.push(line.to_string()),
            }
        }

        debug!(
            lowered = out.instructions.len(),
            skipped = out.skipped.len(),
            "lowered PTX kernel"
        );
        out
    }
}

fn two<'a>(args: &[&'a str]) -> Option<(&'a str, &'a str)> {
    match args {
        [a, b] => Some((*a, *b)),
        _ => None,
    }
}

fn three<'a>(args: &[&'a str]) -> Option<(&'a str, &'a str, &'a str)> {
    match args {
        [a, b, c] => Some((*a, *b, *c)),
        _ => None,
    }
}

fn four<'a>(args: &[&'a str]) -> Option<(&'a str, &'a str, &'a str, &'a str)> {
    match args {
        [a, b, c, d] => Some((*a, *b, *c, *d)),
        _ => None,
    }
}
