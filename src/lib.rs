//! huella: Symbolic PTX/SASS Memory-Access Analyzer
//!
//! Reconstructs the memory-access behavior of a single GPU kernel from its
//! assembly text, without running it on hardware. The kernel is lowered
//! into a small dialect-neutral IR, replayed once per virtual thread of a
//! grid × block launch to obtain every concrete store address, and replayed
//! once symbolically to obtain the closed-form address expression. The
//! resulting address set is scored for the properties the memory subsystem
//! cares about: warp coalescing, stride regularity, and footprint
//! efficiency.
//!
//! # Pipeline
//!
//! ```text
//! assembly text → lowering (PTX | SASS) → IR → { simulate, symbolic } → access analysis → report
//! ```
//!
//! # Example
//!
//! ```rust
//! use huella::lower::{Lowering, PtxLowering};
//! use huella::report::KernelReport;
//! use huella::simulate::LaunchConfig;
//!
//! let ptx = r#"
//!     ld.param.u64 %rd1, [write_kernel_param_0];
//!     cvta.to.global.u64 %rd2, %rd1;
//!     mov.u32 %r1, %ctaid.x;
//!     mov.u32 %r2, %ntid.x;
//!     mov.u32 %r3, %tid.x;
//!     mad.lo.s32 %r4, %r1, %r2, %r3;
//!     mul.wide.s32 %rd3, %r4, 4;
//!     add.s64 %rd4, %rd2, %rd3;
//!     st.global.u32 [%rd4], %r5;
//! "#;
//!
//! let lowered = PtxLowering::new().lower(ptx);
//! let launch = LaunchConfig::new(4, 128, 0x1000);
//! let report = KernelReport::build("write_kernel", "PTX", &lowered, &launch);
//! assert_eq!(report.accesses.len(), 512);
//! assert!(report.warp_stats.iter().all(|w| w.coalesced));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow some pedantic lints for this analysis tool
#![allow(clippy::cast_precision_loss)] // Acceptable for metric percentages
#![allow(clippy::cast_possible_truncation)] // Address math stays in 64 bits
#![allow(clippy::cast_sign_loss)] // Addresses are non-negative by construction
#![allow(clippy::cast_possible_wrap)] // Address math stays well below i64::MAX
#![allow(clippy::format_push_string)] // Performance not critical for report text
#![allow(clippy::unwrap_used)] // Safe for compile-time constant regex
#![allow(clippy::uninlined_format_args)] // Stylistic preference
#![allow(clippy::must_use_candidate)]

pub mod access;
pub mod error;
pub mod eval;
pub mod ir;
pub mod lower;
pub mod output;
pub mod report;
pub mod simulate;
pub mod symbolic;

pub use access::{
    analyze_stride, analyze_warp_usage, coalesce_ranges, estimate_footprint, warp_coalesced,
    AccessPattern, AddressRange, FootprintProfile, StrideProfile, WarpRecord,
};
pub use error::{AnalyzeError, Result};
pub use eval::{EvalMode, RegisterFile, Value};
pub use ir::{CmpOp, Instruction, Operand};
pub use lower::{ConstBankMap, LoweredKernel, Lowering, PtxLowering, SassLowering};
pub use output::{format_json, format_text, write_report, OutputFormat};
pub use report::{KernelReport, MemoryEvent, MemoryWrite};
pub use simulate::{simulate, LaunchConfig, MemoryAccess};
pub use symbolic::symbolic_address;
