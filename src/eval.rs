//! Shared instruction semantics
//!
//! One `step` function gives every IR opcode its meaning, parameterized by
//! [`EvalMode`]: concrete runs fold to 64-bit integers, symbolic runs
//! compose printable formulas over the thread-identity symbols. The two
//! modes never mix within one run.
//!
//! Concrete resolution is strict: a register that was never assigned is a
//! fatal condition for the thread being simulated. Symbolic resolution
//! tolerates unknown names and passes them through as opaque symbols.

use std::collections::HashMap;

use crate::error::{AnalyzeError, Result};
use crate::ir::{CmpOp, Instruction, Operand};

/// A register's value at some point in a run.
///
/// The tag is explicit: literals, symbols, and composed formulas are
/// distinct cases with exhaustive handling at each opcode site, never a
/// string that might secretly be a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Concrete 64-bit integer
    Literal(i64),
    /// An opaque name: a built-in identity register or an unknown input
    Symbol(String),
    /// A composed closed-form expression
    Formula(String),
}

impl Value {
    /// Render for formula composition and display
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Literal(n) => n.to_string(),
            Self::Symbol(s) | Self::Formula(s) => s.clone(),
        }
    }

    /// The literal payload, if this is one
    #[must_use]
    pub fn as_literal(&self) -> Option<i64> {
        match self {
            Self::Literal(n) => Some(*n),
            _ => None,
        }
    }
}

/// A predicate register's value, kept apart from data registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredValue {
    /// Concrete truth value
    Flag(bool),
    /// Boolean formula
    Formula(String),
}

/// Register resolution discipline for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Fold to integers; unknown registers are fatal
    Concrete,
    /// Compose formulas; unknown registers become symbols
    Symbolic,
}

/// Per-run register state: one data-register map, one predicate map.
///
/// Scoped to exactly one simulation run and never shared across threads.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    regs: HashMap<String, Value>,
    preds: HashMap<String, PredValue>,
}

impl RegisterFile {
    /// Empty register file
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a data register
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.regs.insert(name.into(), value);
    }

    /// Look up a data register
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.regs.get(name)
    }

    /// Look up a predicate register
    #[must_use]
    pub fn pred(&self, name: &str) -> Option<&PredValue> {
        self.preds.get(name)
    }
}

/// The resolved outcome of a store instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Resolved byte address
    pub address: Value,
    /// Resolved written value, when the dialect exposes one and it resolves
    pub value: Option<Value>,
}

/// Resolve an operand against the register file under the given mode.
///
/// # Errors
///
/// In concrete mode, returns [`AnalyzeError::UnresolvedRegister`] for a
/// register name with no binding.
fn resolve(op: &Operand, env: &RegisterFile, mode: EvalMode) -> Result<Value> {
    match op {
        Operand::Imm(n) => Ok(Value::Literal(*n)),
        Operand::Reg(name) => lookup(name, env, mode),
    }
}

fn lookup(name: &str, env: &RegisterFile, mode: EvalMode) -> Result<Value> {
    match (env.get(name), mode) {
        (Some(v), _) => Ok(v.clone()),
        (None, EvalMode::Symbolic) => Ok(Value::Symbol(name.to_string())),
        (None, EvalMode::Concrete) => {
            Err(AnalyzeError::UnresolvedRegister(name.to_string()))
        }
    }
}

fn literal(v: &Value) -> Result<i64> {
    v.as_literal()
        .ok_or_else(|| AnalyzeError::UnresolvedRegister(v.render()))
}

/// Apply one instruction to the register file.
///
/// Returns `Some(StoreEvent)` exactly for a store instruction; every other
/// opcode updates the register file and returns `None`. Deterministic and
/// side-effect-free outside `env`.
///
/// # Errors
///
/// In concrete mode, an unassigned register or predicate referenced by the
/// instruction surfaces as an error; the caller is expected to abandon
/// only the affected thread's run.
pub fn step(
    instr: &Instruction,
    env: &mut RegisterFile,
    mode: EvalMode,
) -> Result<Option<StoreEvent>> {
    match instr {
        Instruction::LoadParam { dst, src } | Instruction::ConvertToGlobal { dst, src } => {
            let v = lookup(src, env, mode)?;
            env.set(dst.clone(), v);
        }
        Instruction::Move { dst, src } => {
            let v = resolve(src, env, mode)?;
            env.set(dst.clone(), v);
        }
        Instruction::MultiplyAdd {
            dst,
            src1,
            src2,
            src3,
        } => {
            let a = resolve(src1, env, mode)?;
            let b = resolve(src2, env, mode)?;
            let c = resolve(src3, env, mode)?;
            let v = match mode {
                EvalMode::Concrete => Value::Literal(
                    literal(&a)?.wrapping_mul(literal(&b)?).wrapping_add(literal(&c)?),
                ),
                EvalMode::Symbolic => Value::Formula(format!(
                    "({} * {} + {})",
                    a.render(),
                    b.render(),
                    c.render()
                )),
            };
            env.set(dst.clone(), v);
        }
        Instruction::MultiplyWide { dst, src1, src2 } => {
            let a = resolve(src1, env, mode)?;
            let b = resolve(src2, env, mode)?;
            let v = match mode {
                EvalMode::Concrete => Value::Literal(literal(&a)?.wrapping_mul(literal(&b)?)),
                // stride first, matching the usual `4 * (index)` reading
                EvalMode::Symbolic => {
                    Value::Formula(format!("{} * ({})", b.render(), a.render()))
                }
            };
            env.set(dst.clone(), v);
        }
        Instruction::Add64 { dst, src1, src2 } => {
            let a = resolve(src1, env, mode)?;
            let b = resolve(src2, env, mode)?;
            let v = match mode {
                EvalMode::Concrete => Value::Literal(literal(&a)?.wrapping_add(literal(&b)?)),
                EvalMode::Symbolic => {
                    Value::Formula(format!("{} + {}", a.render(), b.render()))
                }
            };
            env.set(dst.clone(), v);
        }
        Instruction::SetPredicate {
            cmp,
            dst,
            src1,
            src2,
        } => {
            let a = resolve(src1, env, mode)?;
            let b = resolve(src2, env, mode)?;
            let p = match mode {
                EvalMode::Concrete => {
                    let (a, b) = (literal(&a)?, literal(&b)?);
                    PredValue::Flag(match cmp {
                        CmpOp::Eq => a == b,
                        CmpOp::Ne => a != b,
                    })
                }
                EvalMode::Symbolic => {
                    let op = match cmp {
                        CmpOp::Eq => "==",
                        CmpOp::Ne => "!=",
                    };
                    PredValue::Formula(format!("({} {} {})", a.render(), op, b.render()))
                }
            };
            env.preds.insert(dst.clone(), p);
        }
        Instruction::Select {
            dst,
            cond,
            true_val,
            false_val,
        } => {
            let t = resolve(true_val, env, mode)?;
            let f = resolve(false_val, env, mode)?;
            let v = match mode {
                EvalMode::Concrete => match env.pred(cond) {
                    Some(PredValue::Flag(true)) => t,
                    Some(PredValue::Flag(false)) => f,
                    _ => return Err(AnalyzeError::UnresolvedPredicate(cond.clone())),
                },
                EvalMode::Symbolic => {
                    let c = match env.pred(cond) {
                        Some(p) => match p {
                            PredValue::Formula(s) => s.clone(),
                            PredValue::Flag(b) => b.to_string(),
                        },
                        None => cond.clone(),
                    };
                    Value::Formula(format!("({}) ? {} : {}", c, t.render(), f.render()))
                }
            };
            env.set(dst.clone(), v);
        }
        Instruction::StoreGlobal { addr, val } => {
            let address = lookup(addr, env, mode)?;
            // the written value is best-effort: an address that does not
            // resolve kills the thread, a value that does not merely goes
            // unrecorded
            let value = val
                .as_ref()
                .and_then(|v| resolve(v, env, mode).ok());
            return Ok(Some(StoreEvent { address, value }));
        }
    }
    Ok(None)
}
