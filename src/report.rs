//! Kernel report assembly
//!
//! Glues the pipeline together for one kernel: simulate the launch, run
//! the symbolic pass, score the address set, and package everything into
//! one serializable [`KernelReport`] for the presentation layer.
//! Addresses stay integers here; hex strings are a formatting concern.

use serde::Serialize;

use crate::access::{
    analyze_stride, analyze_warp_usage, coalesce_ranges, estimate_footprint, AddressRange,
    FootprintProfile, StrideProfile, WarpRecord, ACCESS_SIZE,
};
use crate::lower::LoweredKernel;
use crate::simulate::{simulate, LaunchConfig, MemoryAccess};
use crate::symbolic::symbolic_address;

/// One store with a concrete written value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryWrite {
    /// Byte address written
    pub address: u64,
    /// Value stored there
    pub written_value: i64,
    /// Global index of the writing thread
    pub thread_id: u64,
    /// Word offset from the kernel's base pointer
    pub word_offset: Option<i64>,
}

/// One coalesced range annotated with the kernel-wide metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryEvent {
    /// Instruction family responsible for the traffic
    pub instruction: String,
    /// Direction of the access
    pub access_type: String,
    /// Bytes per access
    pub access_size: u64,
    /// The contiguous range this event covers
    pub address_range: AddressRange,
    /// Ranges are coalesced by construction
    pub coalesced: bool,
    /// Closed-form address expression, when one store exists
    pub address_expr: Option<String>,
    /// Stride metrics for the whole address set
    #[serde(flatten)]
    pub stride: StrideProfile,
    /// Footprint metrics for the whole address set
    #[serde(flatten)]
    pub footprint: FootprintProfile,
}

/// Complete analysis of one kernel under one launch
#[derive(Debug, Clone, Serialize)]
pub struct KernelReport {
    /// Kernel name (caller-chosen, usually the file stem)
    pub kernel: String,
    /// Dialect the text was lowered from
    pub dialect: String,
    /// Number of blocks launched
    pub grid_dim_x: u32,
    /// Threads per block
    pub block_dim_x: u32,
    /// Byte address of the output buffer
    pub base_address: u64,
    /// Total virtual threads
    pub num_threads: u64,
    /// Whole warps in the launch
    pub num_warps: u64,
    /// Assembly lines the lowering dropped
    pub skipped_lines: usize,
    /// Closed-form address expression
    pub address_expr: Option<String>,
    /// Per-thread accesses in row-major launch order
    pub accesses: Vec<MemoryAccess>,
    /// Per-warp utilization and coalescing
    pub warp_stats: Vec<WarpRecord>,
    /// Stores that carried a resolvable value
    pub memory_writes: Vec<MemoryWrite>,
    /// Coalesced address ranges
    pub address_ranges: Vec<AddressRange>,
    /// Stride metrics
    pub stride: StrideProfile,
    /// Footprint metrics
    pub footprint: FootprintProfile,
    /// One event per coalesced range
    pub memory_events: Vec<MemoryEvent>,
}

impl KernelReport {
    /// Run the full pipeline over lowered IR.
    #[must_use]
    pub fn build(
        kernel: impl Into<String>,
        dialect: impl Into<String>,
        lowered: &LoweredKernel,
        launch: &LaunchConfig,
    ) -> Self {
        let accesses = simulate(&lowered.instructions, launch);
        let addresses: Vec<u64> = accesses.iter().map(|a| a.address).collect();

        let stride = analyze_stride(&addresses);
        let footprint = estimate_footprint(&addresses);
        let address_ranges = coalesce_ranges(&addresses);
        let address_expr = symbolic_address(&lowered.instructions);
        let warp_stats = analyze_warp_usage(&accesses);

        let memory_writes = accesses
            .iter()
            .filter_map(|a| {
                a.written_value.map(|value| MemoryWrite {
                    address: a.address,
                    written_value: value,
                    thread_id: a.global_idx,
                    word_offset: a.word_offset,
                })
            })
            .collect();

        let memory_events = address_ranges
            .iter()
            .map(|&address_range| MemoryEvent {
                instruction: "st.global.u32".to_string(),
                access_type: "write".to_string(),
                access_size: ACCESS_SIZE,
                address_range,
                coalesced: true,
                address_expr: address_expr.clone(),
                stride,
                footprint,
            })
            .collect();

        Self {
            kernel: kernel.into(),
            dialect: dialect.into(),
            grid_dim_x: launch.grid_dim_x,
            block_dim_x: launch.block_dim_x,
            base_address: launch.base_address,
            num_threads: launch.num_threads(),
            num_warps: launch.num_warps(),
            skipped_lines: lowered.skipped_count(),
            address_expr,
            accesses,
            warp_stats,
            memory_writes,
            address_ranges,
            stride,
            footprint,
            memory_events,
        }
    }
}
