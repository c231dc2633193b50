//! Per-intensity frequency histogram.
//!
//! Two strategies count the same thing:
//! - **Global**: every lane adds one to its sample's bin with an atomic add on
//!   the shared histogram. Works for any bin count.
//! - **Local**: every group counts into a private 256-bin scratch histogram,
//!   then merges it into the shared one with one atomic add per non-zero bin.
//!   Only valid for 8-bit images.
//!
//! All channels of a pixel count into the same histogram.

use std::sync::atomic::{AtomicU64, Ordering};

use super::Count;
use crate::compute::dispatch_groups;
use crate::error::{EqualizeError, Result};
use crate::image::{Image, Samples};

/// Bins in a group-private scratch histogram.
pub const LOCAL_BINS: usize = 256;

/// Chunk size of a local-histogram group, in multiples of [`LOCAL_BINS`].
const SAMPLES_PER_LANE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistogramStrategy {
    Global,
    Local,
}

impl HistogramStrategy {
    /// Whether this strategy can count into `bin_count` bins.
    pub fn supports(self, bin_count: usize) -> bool {
        match self {
            HistogramStrategy::Global => true,
            HistogramStrategy::Local => bin_count == LOCAL_BINS,
        }
    }
}

/// Frequency of every intensity. Sum of bins equals the sample count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: Vec<Count>,
}

impl Histogram {
    pub fn from_bins(bins: Vec<Count>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[Count] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Number of samples counted.
    pub fn total(&self) -> Count {
        self.bins.iter().sum()
    }

    pub fn into_bins(self) -> Vec<Count> {
        self.bins
    }
}

/// Count every sample of `image`.
///
/// # Arguments
/// * `image` - 8-bit or 16-bit image, any channel count
/// * `strategy` - Counting strategy; `Local` requires an 8-bit image
/// * `group_size` - Lanes per work group for the global strategy
pub fn build_histogram(
    image: &Image,
    strategy: HistogramStrategy,
    group_size: usize,
) -> Result<Histogram> {
    let bin_count = image.bit_depth().bin_count();
    if !strategy.supports(bin_count) {
        return Err(EqualizeError::InvalidConfig(format!(
            "{strategy:?} histogram cannot count {bin_count} bins"
        )));
    }
    if group_size == 0 {
        return Err(EqualizeError::InvalidConfig(
            "group size must be non-zero".into(),
        ));
    }

    match image.samples() {
        Samples::U8(a) => {
            let samples = a.as_slice().ok_or_else(non_contiguous)?;
            Ok(count(samples, bin_count, strategy, group_size))
        }
        Samples::U16(a) => {
            let samples = a.as_slice().ok_or_else(non_contiguous)?;
            Ok(count(samples, bin_count, strategy, group_size))
        }
    }
}

fn non_contiguous() -> EqualizeError {
    EqualizeError::Backend("sample buffer is not contiguous".into())
}

fn count<S>(samples: &[S], bin_count: usize, strategy: HistogramStrategy, group_size: usize) -> Histogram
where
    S: Copy + Sync + Into<usize>,
{
    let shared: Vec<AtomicU64> = (0..bin_count).map(|_| AtomicU64::new(0)).collect();

    match strategy {
        HistogramStrategy::Global => {
            dispatch_groups(samples, group_size, |_, chunk| {
                for &s in chunk {
                    let bin: usize = s.into();
                    shared[bin].fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        HistogramStrategy::Local => {
            // Each group counts its chunk into a zeroed scratch histogram,
            // then adds every non-zero bin to the shared one.
            dispatch_groups(samples, LOCAL_BINS * SAMPLES_PER_LANE, |_, chunk| {
                let mut local = [0 as Count; LOCAL_BINS];
                for &s in chunk {
                    let bin: usize = s.into();
                    local[bin] += 1;
                }
                for (bin, &c) in local.iter().enumerate() {
                    if c != 0 {
                        shared[bin].fetch_add(c, Ordering::Relaxed);
                    }
                }
            });
        }
    }

    Histogram::from_bins(shared.into_iter().map(AtomicU64::into_inner).collect())
}
