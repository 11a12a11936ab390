//! Address-set analysis
//!
//! Pure functions over the concrete per-thread address set: contiguous
//! range merging, stride regularity, footprint efficiency, and the
//! per-warp coalescing verdict. All of them deduplicate and sort their
//! input internally and degrade gracefully on zero or one address.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::simulate::MemoryAccess;

/// Bytes per access (one 32-bit word)
pub const ACCESS_SIZE: u64 = 4;
/// Memory segment a single coalesced transaction can cover
pub const SEGMENT_SIZE: u64 = 128;
/// Threads per warp
pub const WARP_SIZE: u32 = 32;

/// A maximal run of addresses stepping by exactly one access size.
/// Half-open: `end` is one access past the last address in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    /// First byte covered
    pub start: u64,
    /// One past the last byte covered
    pub end: u64,
}

/// Stride classification of the whole address set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPattern {
    /// Every successive difference equals one access size
    UnitStrided,
    /// Any other resolvable pattern
    Irregular,
    /// Fewer than two addresses; nothing to classify
    Undetermined,
}

/// Stride regularity and packing density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrideProfile {
    /// Common successive difference, when one exists
    pub stride: Option<i64>,
    /// Pattern classification
    pub pattern: AccessPattern,
    /// `used bytes / spanned bytes`, rounded to 2 decimals
    pub density: Option<f64>,
}

/// Touched-versus-spanned byte accounting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FootprintProfile {
    /// Total byte span from first address to one past the last
    pub footprint_bytes: u64,
    /// Bytes actually written
    pub used_bytes: u64,
    /// Span bytes never touched
    pub wasted_bytes: u64,
    /// `used / footprint`, 1.0 for at most one address
    pub efficiency: f64,
}

/// Per-`(block, warp)` utilization and coalescing summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpRecord {
    /// Block the warp belongs to
    #[serde(rename = "blockIdx.x")]
    pub block_idx: u32,
    /// Global warp id
    pub warp_id: u64,
    /// Threads of this warp that stored
    pub num_threads: usize,
    /// True when all 32 lanes stored
    pub fully_utilized: bool,
    /// Lowest address touched by the warp
    pub address_min: u64,
    /// Highest address touched by the warp
    pub address_max: u64,
    /// Adjacent addresses differ by exactly one access size
    pub contiguous: bool,
    /// Aligned to and contained in one memory segment
    pub coalesced: bool,
}

fn dedup_sorted(addresses: &[u64]) -> Vec<u64> {
    let mut addrs = addresses.to_vec();
    addrs.sort_unstable();
    addrs.dedup();
    addrs
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Merge the address set into maximal 4-byte-contiguous ranges.
///
/// The result partitions the deduplicated set: ranges are sorted,
/// non-overlapping, and cover every address exactly once. A single
/// address yields one degenerate range of one access size.
#[must_use]
pub fn coalesce_ranges(addresses: &[u64]) -> Vec<AddressRange> {
    let addrs = dedup_sorted(addresses);
    let Some((&first, rest)) = addrs.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut start = first;
    let mut prev = first;
    for &addr in rest {
        if addr == prev + ACCESS_SIZE {
            prev = addr;
        } else {
            ranges.push(AddressRange {
                start,
                end: prev + ACCESS_SIZE,
            });
            start = addr;
            prev = addr;
        }
    }
    ranges.push(AddressRange {
        start,
        end: prev + ACCESS_SIZE,
    });
    ranges
}

/// Classify stride regularity over the address set.
#[must_use]
pub fn analyze_stride(addresses: &[u64]) -> StrideProfile {
    let addrs = dedup_sorted(addresses);
    if addrs.len() < 2 {
        return StrideProfile {
            stride: None,
            pattern: AccessPattern::Undetermined,
            density: None,
        };
    }

    let diffs: Vec<i64> = addrs
        .windows(2)
        .map(|w| w[1] as i64 - w[0] as i64)
        .collect();
    let uniform = diffs.iter().all(|&d| d == diffs[0]);
    let stride = uniform.then(|| diffs[0]);
    let pattern = if stride == Some(ACCESS_SIZE as i64) {
        AccessPattern::UnitStrided
    } else {
        AccessPattern::Irregular
    };

    let span = (addrs[addrs.len() - 1] + ACCESS_SIZE - addrs[0]) as f64;
    let density = round_to(addrs.len() as f64 * ACCESS_SIZE as f64 / span, 2);

    StrideProfile {
        stride,
        pattern,
        density: Some(density),
    }
}

/// Byte-span accounting over the address set.
#[must_use]
pub fn estimate_footprint(addresses: &[u64]) -> FootprintProfile {
    let addrs = dedup_sorted(addresses);
    let Some((&first, _)) = addrs.split_first() else {
        return FootprintProfile {
            footprint_bytes: 0,
            used_bytes: 0,
            wasted_bytes: 0,
            efficiency: 1.0,
        };
    };

    let last = addrs[addrs.len() - 1] + ACCESS_SIZE;
    let footprint = last - first;
    let used = addrs.len() as u64 * ACCESS_SIZE;
    let efficiency = if footprint > 0 {
        round_to(used as f64 / footprint as f64, 3)
    } else {
        1.0
    };

    FootprintProfile {
        footprint_bytes: footprint,
        used_bytes: used,
        wasted_bytes: footprint - used,
        efficiency,
    }
}

/// Whether one warp's accesses satisfy the aligned-segment rule: the
/// lowest address sits on a segment boundary and the whole span fits in
/// one segment. An empty warp is not coalesced.
#[must_use]
pub fn warp_coalesced(addresses: &[u64]) -> bool {
    let addrs = dedup_sorted(addresses);
    let (Some(&min), Some(&max)) = (addrs.first(), addrs.last()) else {
        return false;
    };
    let aligned = min % SEGMENT_SIZE == 0;
    let within_segment = (max + ACCESS_SIZE) - min <= SEGMENT_SIZE;
    aligned && within_segment
}

/// Group accesses by `(block, warp)` and summarize each group.
///
/// Output is ordered by block then warp id, independent of input order.
#[must_use]
pub fn analyze_warp_usage(accesses: &[MemoryAccess]) -> Vec<WarpRecord> {
    let mut warps: BTreeMap<(u32, u64), Vec<u64>> = BTreeMap::new();
    for access in accesses {
        warps
            .entry((access.block_idx, access.warp_id))
            .or_default()
            .push(access.address);
    }

    warps
        .into_iter()
        .map(|((block_idx, warp_id), mut addrs)| {
            addrs.sort_unstable();
            let contiguous = addrs.windows(2).all(|w| w[1] - w[0] == ACCESS_SIZE);
            let coalesced = warp_coalesced(&addrs);
            WarpRecord {
                block_idx,
                warp_id,
                num_threads: addrs.len(),
                fully_utilized: addrs.len() == WARP_SIZE as usize,
                address_min: addrs[0],
                address_max: addrs[addrs.len() - 1],
                contiguous,
                coalesced,
            }
        })
        .collect()
}
