//! Per-thread launch simulation
//!
//! Replays the kernel IR once per virtual thread of a grid × block launch,
//! in concrete mode, and collects one [`MemoryAccess`] per thread that
//! reaches a store. Every run is a pure function of its seeded register
//! file and the shared read-only IR, so blocks fan out across a rayon
//! parallel iterator with no locking; collection preserves the row-major
//! (block-outer, thread-inner) order a sequential loop would produce.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::access::{ACCESS_SIZE, WARP_SIZE};
use crate::eval::{step, EvalMode, RegisterFile, StoreEvent, Value};
use crate::ir::Instruction;

/// Element count seeded when the caller does not supply one, matching the
/// constant-bank slot the machine dialect may read.
pub const DEFAULT_ELEMENT_COUNT: i64 = 1234;

/// One-dimensional launch geometry plus the output buffer placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Number of blocks
    pub grid_dim_x: u32,
    /// Threads per block
    pub block_dim_x: u32,
    /// Byte address the `out` pointer resolves to
    pub base_address: u64,
    /// Value seeded into the `input_size` constant-bank slot
    pub element_count: i64,
}

impl LaunchConfig {
    /// Launch with the default element count
    #[must_use]
    pub fn new(grid_dim_x: u32, block_dim_x: u32, base_address: u64) -> Self {
        Self {
            grid_dim_x,
            block_dim_x,
            base_address,
            element_count: DEFAULT_ELEMENT_COUNT,
        }
    }

    /// Override the element count seed
    #[must_use]
    pub fn with_element_count(mut self, element_count: i64) -> Self {
        self.element_count = element_count;
        self
    }

    /// Total virtual threads in the launch
    #[must_use]
    pub fn num_threads(&self) -> u64 {
        u64::from(self.grid_dim_x) * u64::from(self.block_dim_x)
    }

    /// Whole warps covered by the launch (informational)
    #[must_use]
    pub fn num_warps(&self) -> u64 {
        self.num_threads() / u64::from(WARP_SIZE)
    }
}

/// One thread's terminal store, fully resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccess {
    /// Block index within the grid
    #[serde(rename = "blockIdx.x")]
    pub block_idx: u32,
    /// Thread index within the block
    #[serde(rename = "threadIdx.x")]
    pub thread_idx: u32,
    /// Global warp id (`global_idx / 32`)
    pub warp_id: u64,
    /// Flattened thread index (`block_idx * block_dim + thread_idx`)
    #[serde(rename = "globalIdx")]
    pub global_idx: u64,
    /// Resolved byte address
    pub address: u64,
    /// Written value, when the store's value operand resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_value: Option<i64>,
    /// Word offset from the base pointer, recorded alongside the value
    #[serde(rename = "memory_offset", skip_serializing_if = "Option::is_none")]
    pub word_offset: Option<i64>,
}

/// Run the kernel for every thread of the launch.
///
/// Threads that trip an unresolved register abort individually and emit
/// nothing; kernels without a reachable store emit nothing at all. The
/// output is deterministic for identical inputs.
#[instrument(skip(ir, launch), fields(grid = launch.grid_dim_x, block = launch.block_dim_x))]
pub fn simulate(ir: &[Instruction], launch: &LaunchConfig) -> Vec<MemoryAccess> {
    (0..launch.grid_dim_x)
        .into_par_iter()
        .flat_map_iter(|block_idx| {
            (0..launch.block_dim_x)
                .filter_map(move |thread_idx| run_thread(ir, launch, block_idx, thread_idx))
        })
        .collect()
}

/// Replay the IR for one `(block, thread)` pair.
fn run_thread(
    ir: &[Instruction],
    launch: &LaunchConfig,
    block_idx: u32,
    thread_idx: u32,
) -> Option<MemoryAccess> {
    let mut env = RegisterFile::new();
    env.set("ctaid.x", Value::Literal(i64::from(block_idx)));
    env.set("ntid.x", Value::Literal(i64::from(launch.block_dim_x)));
    env.set("tid.x", Value::Literal(i64::from(thread_idx)));
    env.set("out", Value::Literal(launch.base_address as i64));
    env.set("input_size", Value::Literal(launch.element_count));

    let mut last: Option<StoreEvent> = None;
    for instr in ir {
        match step(instr, &mut env, EvalMode::Concrete) {
            Ok(Some(event)) => last = Some(event),
            Ok(None) => {}
            // an unresolved register kills this thread's run, nothing else
            Err(_) => return None,
        }
    }

    let event = last?;
    let address = event.address.as_literal()? as u64;
    let written_value = event.value.and_then(|v| v.as_literal());
    let global_idx = u64::from(block_idx) * u64::from(launch.block_dim_x) + u64::from(thread_idx);
    let word_offset = written_value
        .is_some()
        .then(|| (address as i64 - launch.base_address as i64) / ACCESS_SIZE as i64);

    Some(MemoryAccess {
        block_idx,
        thread_idx,
        warp_id: global_idx / u64::from(WARP_SIZE),
        global_idx,
        address,
        written_value,
        word_offset,
    })
}
