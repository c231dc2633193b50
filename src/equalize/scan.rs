//! Prefix scans that turn a histogram into a cumulative histogram.
//!
//! ## Strategies
//!
//! | Strategy | Kind | Work | Rounds | Group width |
//! |----------|------|------|--------|-------------|
//! | Serial | inclusive | O(n) | 1 pass | any |
//! | Hillis-Steele | inclusive | O(n log n) | ceil(log2 w) | any |
//! | Blelloch | exclusive | O(n) | 2 log2 w | power of two |
//!
//! Blelloch results are turned inclusive by adding each original element
//! back, so every strategy yields the same cumulative histogram.
//!
//! ## Segmented Scans
//!
//! A histogram longer than one group is cut into segments of the group width.
//! Each segment is scanned on its own (the last one zero-padded in local
//! memory), then [`block_sum`](super::block_sum) stitches the segments
//! together with per-segment offsets.

use tracing::debug_span;

use super::block_sum::{self, BlockSums, ScannedBlockSums};
use super::histogram::Histogram;
use super::Count;
use crate::compute::{dispatch_groups_mut, LocalBuffer};
use crate::error::{EqualizeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStrategy {
    Serial,
    HillisSteele,
    Blelloch,
}

impl ScanStrategy {
    /// Whether a single group of `width` lanes can run this strategy.
    pub fn supports_width(self, width: usize) -> bool {
        match self {
            ScanStrategy::Blelloch => width.is_power_of_two(),
            ScanStrategy::Serial | ScanStrategy::HillisSteele => width > 0,
        }
    }

    /// Local memory slots a group needs to scan `len` elements.
    fn group_width(self, len: usize) -> usize {
        match self {
            ScanStrategy::Blelloch => len.next_power_of_two(),
            ScanStrategy::Serial | ScanStrategy::HillisSteele => len,
        }
    }
}

/// Running total of a histogram. Non-decreasing; the last entry equals the
/// histogram's sample count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeHistogram {
    bins: Vec<Count>,
}

impl CumulativeHistogram {
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

    /// Final entry, i.e. the number of samples.
    pub fn total(&self) -> Count {
        self.bins.last().copied().unwrap_or(0)
    }

    /// Smallest non-zero entry, or zero when every entry is zero.
    pub fn min_nonzero(&self) -> Count {
        self.bins.iter().copied().find(|&c| c != 0).unwrap_or(0)
    }

    pub fn is_non_decreasing(&self) -> bool {
        self.bins.windows(2).all(|w| w[0] <= w[1])
    }

    pub fn into_bins(self) -> Vec<Count> {
        self.bins
    }
}

/// How a histogram is laid out over work groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanLayout {
    /// The whole histogram is scanned by one group.
    SingleGroup,
    /// The histogram is cut into `segment_width` segments whose block sums
    /// are scanned with `block_scan`.
    Segmented {
        segment_width: usize,
        block_count: usize,
        block_scan: ScanStrategy,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    pub strategy: ScanStrategy,
    pub layout: ScanLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub cumulative: CumulativeHistogram,
    /// Present only for segmented scans.
    pub block_sums: Option<BlockSums>,
    /// Present only for segmented scans.
    pub scanned_block_sums: Option<ScannedBlockSums>,
}

/// Inclusive prefix sum in one pass.
pub fn serial_inclusive(input: &[Count]) -> Vec<Count> {
    let mut sum = 0;
    input
        .iter()
        .map(|&v| {
            sum += v;
            sum
        })
        .collect()
}

/// Exclusive prefix sum in one pass: `output[0] = 0`.
pub fn serial_exclusive(input: &[Count]) -> Vec<Count> {
    let mut sum = 0;
    input
        .iter()
        .map(|&v| {
            let before = sum;
            sum += v;
            before
        })
        .collect()
}

/// Inclusive Hillis-Steele scan of one group's local memory.
fn hillis_steele(local: &mut LocalBuffer<Count>) {
    let n = local.len();
    let mut stride = 1;
    while stride < n {
        for lane in 0..n {
            let mut v = local.read(lane);
            if lane >= stride {
                v += local.read(lane - stride);
            }
            local.write(lane, v);
        }
        local.barrier();
        stride *= 2;
    }
}

/// Exclusive Blelloch scan of one group's local memory. The length must be
/// a power of two.
fn blelloch(local: &mut LocalBuffer<Count>) {
    let n = local.len();
    if n == 0 {
        return;
    }
    debug_assert!(n.is_power_of_two());

    // Up-sweep: build partial sums in place.
    let mut stride = 1;
    while stride < n {
        for lane in 0..n / (2 * stride) {
            let right = (lane + 1) * 2 * stride - 1;
            let left = right - stride;
            local.write(right, local.read(right) + local.read(left));
        }
        local.barrier();
        stride *= 2;
    }

    local.write(n - 1, 0);
    local.barrier();

    // Down-sweep
    stride = n / 2;
    while stride > 0 {
        for lane in 0..n / (2 * stride) {
            let right = (lane + 1) * 2 * stride - 1;
            let left = right - stride;
            let t = local.read(left);
            local.write(left, local.read(right));
            local.write(right, local.read(right) + t);
        }
        local.barrier();
        stride /= 2;
    }
}

/// Inclusive scan of `segment` in place, as one group of `width` lanes.
fn scan_segment(segment: &mut [Count], width: usize, strategy: ScanStrategy) {
    match strategy {
        ScanStrategy::Serial => {
            let mut sum = 0;
            for v in segment.iter_mut() {
                sum += *v;
                *v = sum;
            }
        }
        ScanStrategy::HillisSteele => {
            let mut local = LocalBuffer::zeroed(width);
            local.load(segment);
            hillis_steele(&mut local);
            local.store(segment);
        }
        ScanStrategy::Blelloch => {
            let mut local = LocalBuffer::zeroed(width);
            local.load(segment);
            blelloch(&mut local);
            for (lane, v) in segment.iter_mut().enumerate() {
                *v += local.read(lane);
            }
        }
    }
}

/// Inclusive scan of the whole input as a single group.
pub fn scan_single_group(input: &[Count], strategy: ScanStrategy) -> Vec<Count> {
    let mut out = input.to_vec();
    let width = strategy.group_width(input.len());
    scan_segment(&mut out, width, strategy);
    out
}

/// Scan every `segment_width` segment of `input` independently.
///
/// Each output segment holds the inclusive scan of its own input segment
/// only; segments are stitched with [`block_sum::apply_block_offsets`].
/// `segment_width` must be non-zero, and a power of two for Blelloch.
pub fn scan_segments(
    input: &[Count],
    segment_width: usize,
    strategy: ScanStrategy,
) -> Result<Vec<Count>> {
    if !strategy.supports_width(segment_width) {
        return Err(EqualizeError::InvalidConfig(format!(
            "{strategy:?} scan cannot run segments of width {segment_width}"
        )));
    }

    let mut out = input.to_vec();
    dispatch_groups_mut(&mut out, segment_width, |_, segment| {
        scan_segment(segment, segment_width, strategy);
    });
    Ok(out)
}

/// Run the scan stage: histogram in, globally correct cumulative histogram out.
pub fn cumulative_histogram(histogram: &Histogram, plan: &ScanPlan) -> Result<ScanOutput> {
    match plan.layout {
        ScanLayout::SingleGroup => Ok(ScanOutput {
            cumulative: CumulativeHistogram::from_bins(scan_single_group(
                histogram.bins(),
                plan.strategy,
            )),
            block_sums: None,
            scanned_block_sums: None,
        }),
        ScanLayout::Segmented {
            segment_width,
            block_scan,
            ..
        } => {
            let local = scan_segments(histogram.bins(), segment_width, plan.strategy)?;

            let _span = debug_span!("block_sums", ?block_scan, segment_width).entered();
            let sums = block_sum::extract_block_sums(&local, segment_width);
            let scanned = block_sum::scan_block_sums(&sums, block_scan)?;
            let cumulative = block_sum::apply_block_offsets(local, &scanned, segment_width)?;
            Ok(ScanOutput {
                cumulative,
                block_sums: Some(sums),
                scanned_block_sums: Some(scanned),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [ScanStrategy; 3] = [
        ScanStrategy::Serial,
        ScanStrategy::HillisSteele,
        ScanStrategy::Blelloch,
    ];

    #[test]
    fn test_serial_scans() {
        let input = [3, 1, 7, 0, 4, 1, 6, 3];
        assert_eq!(serial_inclusive(&input), vec![3, 4, 11, 11, 15, 16, 22, 25]);
        assert_eq!(serial_exclusive(&input), vec![0, 3, 4, 11, 11, 15, 16, 22]);
    }

    #[test]
    fn test_empty_and_single() {
        for strategy in ALL {
            assert!(scan_single_group(&[], strategy).is_empty());
            assert_eq!(scan_single_group(&[42], strategy), vec![42]);
        }
    }

    #[test]
    fn test_single_group_non_power_of_two_length() {
        let input: Vec<Count> = (1..=11).collect();
        let expected = serial_inclusive(&input);
        for strategy in ALL {
            assert_eq!(scan_single_group(&input, strategy), expected, "{strategy:?}");
        }
    }

    #[test]
    fn test_blelloch_exclusive_phase() {
        let mut local = LocalBuffer::zeroed(8);
        local.load(&[3, 1, 7, 0, 4, 1, 6, 3]);
        blelloch(&mut local);
        assert_eq!(local.as_slice(), &[0, 3, 4, 11, 11, 15, 16, 22]);
    }

    #[test]
    fn test_segments_are_local() {
        let input = vec![1; 10];
        let local = scan_segments(&input, 4, ScanStrategy::HillisSteele).unwrap();
        assert_eq!(local, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2]);
    }

    #[test]
    fn test_segmented_matches_serial() {
        let input: Vec<Count> = (0..1000).map(|i| (i * 31 % 17) as Count).collect();
        let hist = Histogram::from_bins(input.clone());
        let expected = serial_inclusive(&input);

        for (strategy, width) in [
            (ScanStrategy::HillisSteele, 64),
            (ScanStrategy::HillisSteele, 96),
            (ScanStrategy::Blelloch, 64),
            (ScanStrategy::Serial, 100),
        ] {
            let block_count = input.len().div_ceil(width);
            let plan = ScanPlan {
                strategy,
                layout: ScanLayout::Segmented {
                    segment_width: width,
                    block_count,
                    block_scan: ScanStrategy::Serial,
                },
            };
            let out = cumulative_histogram(&hist, &plan).unwrap();
            assert_eq!(out.cumulative.bins(), expected.as_slice(), "{strategy:?}/{width}");
            assert_eq!(out.block_sums.unwrap().len(), block_count);
        }
    }

    #[test]
    fn test_blelloch_rejects_odd_segment_width() {
        let hist = Histogram::from_bins((1..=12).collect());
        let plan = ScanPlan {
            strategy: ScanStrategy::Blelloch,
            layout: ScanLayout::Segmented {
                segment_width: 6,
                block_count: 2,
                block_scan: ScanStrategy::Serial,
            },
        };
        let err = cumulative_histogram(&hist, &plan).unwrap_err();
        assert!(matches!(err, EqualizeError::InvalidConfig(_)));

        assert!(scan_segments(hist.bins(), 0, ScanStrategy::Serial).is_err());
        let hs = scan_segments(hist.bins(), 6, ScanStrategy::HillisSteele).unwrap();
        assert_eq!(&hs[..6], &[1, 3, 6, 10, 15, 21]);
    }

    #[test]
    fn test_min_nonzero_and_total() {
        let ch = CumulativeHistogram::from_bins(vec![0, 0, 5, 5, 8]);
        assert_eq!(ch.min_nonzero(), 5);
        assert_eq!(ch.total(), 8);
        assert!(ch.is_non_decreasing());
        assert_eq!(CumulativeHistogram::from_bins(vec![0; 4]).min_nonzero(), 0);
    }

    proptest! {
        #[test]
        fn prop_strategies_agree(
            bins in prop::collection::vec(0u64..10_000, 1..600),
            width_exp in 0u32..8,
        ) {
            let hist = Histogram::from_bins(bins.clone());
            let expected = serial_inclusive(&bins);
            let width = 1usize << width_exp;
            let block_count = bins.len().div_ceil(width);

            for strategy in ALL {
                let single = ScanPlan { strategy, layout: ScanLayout::SingleGroup };
                let out = cumulative_histogram(&hist, &single).unwrap();
                prop_assert_eq!(out.cumulative.bins(), expected.as_slice());

                let segmented = ScanPlan {
                    strategy,
                    layout: ScanLayout::Segmented {
                        segment_width: width,
                        block_count,
                        block_scan: ScanStrategy::Serial,
                    },
                };
                let out = cumulative_histogram(&hist, &segmented).unwrap();
                prop_assert_eq!(out.cumulative.bins(), expected.as_slice());
                prop_assert!(out.cumulative.is_non_decreasing());
            }
        }
    }
}
