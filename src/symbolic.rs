//! Symbolic address evaluation
//!
//! One pass over the IR in symbolic mode, with the thread-identity
//! registers bound to their own names, yields a closed-form expression for
//! the address function of the whole kernel. This characterizes the
//! access pattern independently of any launch geometry: substituting a
//! concrete `(ctaid.x, ntid.x, tid.x, out)` tuple into the returned
//! formula reproduces the simulator's address for that thread.

use crate::eval::{step, EvalMode, RegisterFile, Value};
use crate::ir::Instruction;

/// Registers pre-bound to themselves before the symbolic run
const BUILTIN_SYMBOLS: &[&str] = &["ctaid.x", "ntid.x", "tid.x", "out", "input_size"];

/// Derive the kernel's address expression.
///
/// Returns the formula bound to the first store's address operand, or
/// `None` for a kernel that never stores. Unknown registers flow through
/// as unresolved symbols rather than failing the run.
#[must_use]
pub fn symbolic_address(ir: &[Instruction]) -> Option<String> {
    let mut env = RegisterFile::new();
    for name in BUILTIN_SYMBOLS {
        env.set(*name, Value::Symbol((*name).to_string()));
    }

    for instr in ir {
        // symbolic stepping cannot fail: unknown names become symbols
        if let Ok(Some(event)) = step(instr, &mut env, EvalMode::Symbolic) {
            return Some(event.address.render());
        }
    }
    None
}
