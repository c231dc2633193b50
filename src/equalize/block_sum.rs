//! Block sums for stitching segment-local scans together.
//!
//! After a segmented scan every segment holds a prefix sum of its own slice
//! only. The total of segment `k` (its last local entry) is its block sum;
//! the exclusive scan of the block sums gives the offset every element of
//! segment `k` is missing.

use super::scan::{self, CumulativeHistogram, ScanStrategy};
use super::Count;
use crate::compute::{dispatch_groups, dispatch_groups_mut};
use crate::error::{EqualizeError, Result};

/// Per-segment totals of a segmented scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSums {
    sums: Vec<Count>,
}

impl BlockSums {
    pub fn sums(&self) -> &[Count] {
        &self.sums
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }
}

/// Exclusive scan of [`BlockSums`]: entry `k` is the sum of blocks `0..k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBlockSums {
    offsets: Vec<Count>,
}

impl ScannedBlockSums {
    pub fn offsets(&self) -> &[Count] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Take the last element of every `segment_width` segment.
pub fn extract_block_sums(local_scan: &[Count], segment_width: usize) -> BlockSums {
    let sums = dispatch_groups(local_scan, segment_width, |_, segment| {
        segment.last().copied().unwrap_or(0)
    });
    BlockSums { sums }
}

/// Scan the block sums into per-segment offsets.
///
/// `Serial` and `HillisSteele` handle any block count. `Blelloch` runs the
/// block sums as one group and needs a power-of-two count.
pub fn scan_block_sums(block_sums: &BlockSums, strategy: ScanStrategy) -> Result<ScannedBlockSums> {
    let n = block_sums.len();
    if strategy == ScanStrategy::Blelloch && !strategy.supports_width(n) {
        return Err(EqualizeError::Backend(format!(
            "Blelloch block-sum scan needs a power-of-two block count, got {n}"
        )));
    }

    let inclusive = scan::scan_single_group(&block_sums.sums, strategy);
    let offsets = inclusive
        .iter()
        .zip(&block_sums.sums)
        .map(|(&total, &own)| total - own)
        .collect();
    Ok(ScannedBlockSums { offsets })
}

/// Add each segment's offset into its local scan, producing the complete
/// cumulative histogram.
pub fn apply_block_offsets(
    mut local_scan: Vec<Count>,
    offsets: &ScannedBlockSums,
    segment_width: usize,
) -> Result<CumulativeHistogram> {
    let expected = local_scan.len().div_ceil(segment_width);
    if offsets.len() != expected {
        return Err(EqualizeError::Backend(format!(
            "expected {expected} block offsets, got {}",
            offsets.len()
        )));
    }

    dispatch_groups_mut(&mut local_scan, segment_width, |group, segment| {
        let offset = offsets.offsets[group.id];
        for v in segment.iter_mut() {
            *v += offset;
        }
    });
    Ok(CumulativeHistogram::from_bins(local_scan))
}
