//! Histogram equalization stages.
//!
//! ## Data Flow
//!
//! | Stage | Module | Input | Output |
//! |-------|--------|-------|--------|
//! | Histogram | [`histogram`] | image samples | [`Histogram`] |
//! | Scan | [`scan`] | histogram | [`CumulativeHistogram`] |
//! | Block sums | [`block_sum`] | segment-local scans | [`BlockSums`], [`ScannedBlockSums`] |
//! | Lookup table | [`lut`] | cumulative histogram | [`LookupTable`] |
//! | Remap | [`remap`] | image + lookup table | equalized image |
//!
//! [`pipeline`] picks the variant of each stage once per run and executes
//! the stages strictly in order. Every stage returns an owned buffer that
//! the next stage only reads.

pub mod block_sum;
pub mod histogram;
pub mod lut;
pub mod pipeline;
pub mod remap;
pub mod scan;

/// Histogram counter type. Wide enough for the sample count of any image
/// that fits in memory.
pub type Count = u64;

pub use block_sum::{BlockSums, ScannedBlockSums};
pub use histogram::{Histogram, HistogramStrategy};
pub use lut::LookupTable;
pub use pipeline::{
    equalize, EqualizeOutput, Equalizer, ExecutionPlan, Fallback, PipelineConfig, RunMode,
};
pub use scan::{CumulativeHistogram, ScanLayout, ScanOutput, ScanPlan, ScanStrategy};
