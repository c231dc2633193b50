//! Variant selection and stage sequencing.
//!
//! ## Run Modes
//!
//! | Id | Mode | Histogram | Segment scan | Block-sum scan |
//! |----|------|-----------|--------------|----------------|
//! | 0 | Auto | local (8-bit) / global | Hillis-Steele | Blelloch, or serial fallback |
//! | 1 | Optimized A | local (8-bit) / global | Blelloch, or Hillis-Steele fallback | Blelloch, or serial fallback |
//! | 2 | Optimized B | local (8-bit) / global | Blelloch over the whole histogram | none |
//! | other | Basic | global | serial | none |
//!
//! Auto and Optimized A only segment the histogram when it is longer than
//! the segment width. The Blelloch block-sum scan runs the block sums as one
//! group, so it needs a power-of-two block count no larger than the segment
//! width; otherwise the block sums are scanned serially. Such downgrades are
//! recorded as [`Fallback`]s on the plan and never fail the run. Optimized B
//! also records a [`Fallback`] when its single group is wider than the
//! segment width. The plan keeps its requested mode, so an optimized run may
//! still report a serial block-sum scan among its fallbacks.

use tracing::{debug, debug_span, info};

use super::block_sum::{BlockSums, ScannedBlockSums};
use super::histogram::{build_histogram, Histogram, HistogramStrategy};
use super::lut::{generate_lut, LookupTable};
use super::remap::remap;
use super::scan::{cumulative_histogram, CumulativeHistogram, ScanLayout, ScanPlan, ScanStrategy};
use super::Count;
use crate::compute::Backend;
use crate::error::{EqualizeError, Result};
use crate::image::{BitDepth, Image};

/// Default segment width, a typical maximum work-group size.
pub const DEFAULT_SEGMENT_WIDTH: usize = 256;

/// Requested pipeline variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunMode {
    /// Fastest variant the data shape allows.
    #[default]
    Auto,
    /// Work-efficient segment scans.
    OptimizedA,
    /// One work-efficient scan over the whole histogram, no block-sum stage.
    ///
    /// The single group spans every bin regardless of the segment width, so
    /// a 16-bit run uses a 65536-lane group, wider than a device would
    /// accept. The plan records this as [`Fallback::GroupExceedsSegmentWidth`].
    OptimizedB,
    /// Correctness baseline.
    Basic,
}

impl RunMode {
    /// Parse a numeric mode id. Unknown ids select [`RunMode::Basic`].
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => RunMode::Auto,
            1 => RunMode::OptimizedA,
            2 => RunMode::OptimizedB,
            _ => RunMode::Basic,
        }
    }

    /// Canonical id. `Basic` reports 3.
    pub fn id(self) -> i32 {
        match self {
            RunMode::Auto => 0,
            RunMode::OptimizedA => 1,
            RunMode::OptimizedB => 2,
            RunMode::Basic => 3,
        }
    }

    pub fn is_optimized(self) -> bool {
        !matches!(self, RunMode::Basic)
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub mode: RunMode,
    /// Maximum lanes in one work group, as reported by the backend.
    pub segment_width: usize,
    /// Dedicated worker threads; `None` shares rayon's global pool.
    pub worker_threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Auto,
            segment_width: DEFAULT_SEGMENT_WIDTH,
            worker_threads: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_segment_width(mut self, segment_width: usize) -> Self {
        self.segment_width = segment_width;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.segment_width == 0 {
            return Err(EqualizeError::InvalidConfig(
                "segment width must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Segments needed to cover `bin_count` bins.
    pub fn block_count(&self, bin_count: usize) -> usize {
        bin_count.div_ceil(self.segment_width.max(1))
    }

    /// Whether `bin_count` bins split into a power-of-two number of segments.
    pub fn block_count_is_power_of_two(&self, bin_count: usize) -> bool {
        self.block_count(bin_count).is_power_of_two()
    }
}

/// A downgrade applied because the data shape ruled out the requested
/// variant, or a group limit the requested variant runs past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Block count is not a power of two; block sums scanned serially.
    BlockCountNotPowerOfTwo { block_count: usize },
    /// More blocks than one group holds; block sums scanned serially.
    BlockCountExceedsGroup {
        block_count: usize,
        segment_width: usize,
    },
    /// Segment width is not a power of two; segments scanned with
    /// Hillis-Steele instead of Blelloch.
    SegmentWidthNotPowerOfTwo { segment_width: usize },
    /// A single-group scan is wider than the segment width; run anyway on
    /// the emulated backend.
    GroupExceedsSegmentWidth {
        group_width: usize,
        segment_width: usize,
    },
}

/// Variant decision for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub mode: RunMode,
    pub bit_depth: BitDepth,
    pub histogram: HistogramStrategy,
    pub scan: ScanPlan,
    pub fallbacks: Vec<Fallback>,
}

impl ExecutionPlan {
    /// Choose every stage variant for an image of `bit_depth`.
    pub fn select(bit_depth: BitDepth, config: &PipelineConfig) -> Self {
        let bin_count = bit_depth.bin_count();
        let width = config.segment_width.max(1);
        let mut fallbacks = Vec::new();

        let histogram = if config.mode.is_optimized() && HistogramStrategy::Local.supports(bin_count)
        {
            HistogramStrategy::Local
        } else {
            HistogramStrategy::Global
        };

        let scan = match config.mode {
            RunMode::Basic => ScanPlan {
                strategy: ScanStrategy::Serial,
                layout: ScanLayout::SingleGroup,
            },
            RunMode::OptimizedB => {
                if bin_count > width {
                    fallbacks.push(Fallback::GroupExceedsSegmentWidth {
                        group_width: bin_count.next_power_of_two(),
                        segment_width: width,
                    });
                }
                ScanPlan {
                    strategy: ScanStrategy::Blelloch,
                    layout: ScanLayout::SingleGroup,
                }
            }
            RunMode::Auto | RunMode::OptimizedA => {
                // Lanes one group actually runs: the whole histogram when it
                // fits, otherwise a full segment.
                let lanes = bin_count.min(width);
                let strategy = if config.mode == RunMode::OptimizedA {
                    if ScanStrategy::Blelloch.supports_width(lanes) {
                        ScanStrategy::Blelloch
                    } else {
                        fallbacks.push(Fallback::SegmentWidthNotPowerOfTwo { segment_width: width });
                        ScanStrategy::HillisSteele
                    }
                } else {
                    ScanStrategy::HillisSteele
                };

                if bin_count <= width {
                    ScanPlan {
                        strategy,
                        layout: ScanLayout::SingleGroup,
                    }
                } else {
                    let block_count = config.block_count(bin_count);
                    let block_scan = if !block_count.is_power_of_two() {
                        fallbacks.push(Fallback::BlockCountNotPowerOfTwo { block_count });
                        ScanStrategy::Serial
                    } else if block_count > width {
                        fallbacks.push(Fallback::BlockCountExceedsGroup {
                            block_count,
                            segment_width: width,
                        });
                        ScanStrategy::Serial
                    } else {
                        ScanStrategy::Blelloch
                    };
                    ScanPlan {
                        strategy,
                        layout: ScanLayout::Segmented {
                            segment_width: width,
                            block_count,
                            block_scan,
                        },
                    }
                }
            }
        };

        Self {
            mode: config.mode,
            bit_depth,
            histogram,
            scan,
            fallbacks,
        }
    }

    pub fn is_segmented(&self) -> bool {
        matches!(self.scan.layout, ScanLayout::Segmented { .. })
    }

    pub fn block_count(&self) -> Option<usize> {
        match self.scan.layout {
            ScanLayout::Segmented { block_count, .. } => Some(block_count),
            ScanLayout::SingleGroup => None,
        }
    }

    pub fn block_scan(&self) -> Option<ScanStrategy> {
        match self.scan.layout {
            ScanLayout::Segmented { block_scan, .. } => Some(block_scan),
            ScanLayout::SingleGroup => None,
        }
    }
}

/// Every buffer produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizeOutput {
    pub plan: ExecutionPlan,
    pub histogram: Histogram,
    pub cumulative: CumulativeHistogram,
    pub block_sums: Option<BlockSums>,
    pub scanned_block_sums: Option<ScannedBlockSums>,
    pub lut: LookupTable,
    pub image: Image,
}

/// Histogram equalization pipeline bound to one backend.
///
/// Each [`Equalizer::run`] allocates its own buffers, so one equalizer may
/// serve concurrent runs.
#[derive(Debug)]
pub struct Equalizer {
    config: PipelineConfig,
    backend: Backend,
}

impl Equalizer {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let backend = Backend::new(config.segment_width, config.worker_threads)?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Variant decision for an image of `bit_depth`, without running anything.
    pub fn plan(&self, bit_depth: BitDepth) -> ExecutionPlan {
        ExecutionPlan::select(bit_depth, &self.config)
    }

    /// Equalize `image`.
    ///
    /// Stages run strictly in order. Any stage error aborts the run and no
    /// partial output is returned.
    pub fn run(&self, image: &Image) -> Result<EqualizeOutput> {
        let bit_depth = image.bit_depth();
        let plan = self.plan(bit_depth);
        let bin_count = bit_depth.bin_count();
        let group_size = self.backend.max_group_size();

        info!(
            mode = ?plan.mode,
            bits = bit_depth.bits(),
            histogram = ?plan.histogram,
            scan = ?plan.scan.strategy,
            block_scan = ?plan.block_scan(),
            "equalizing {}x{}x{} image",
            image.width(),
            image.height(),
            image.channels()
        );
        for fallback in &plan.fallbacks {
            debug!(?fallback, "variant downgraded");
        }

        self.backend.run(|| -> Result<EqualizeOutput> {
            let histogram = {
                let _span = debug_span!("histogram", strategy = ?plan.histogram).entered();
                build_histogram(image, plan.histogram, group_size)?
            };

            let scanned = {
                let _span = debug_span!("scan", strategy = ?plan.scan.strategy).entered();
                cumulative_histogram(&histogram, &plan.scan)?
            };

            let total = image.sample_count() as Count;
            let lut = {
                let _span = debug_span!("lut").entered();
                generate_lut(&scanned.cumulative, bin_count, total)?
            };

            let equalized = {
                let _span = debug_span!("remap").entered();
                remap(image, &lut)?
            };

            Ok(EqualizeOutput {
                plan: plan.clone(),
                histogram,
                cumulative: scanned.cumulative,
                block_sums: scanned.block_sums,
                scanned_block_sums: scanned.scanned_block_sums,
                lut,
                image: equalized,
            })
        })
    }
}

/// Equalize `image` with a one-off [`Equalizer`].
pub fn equalize(image: &Image, config: &PipelineConfig) -> Result<EqualizeOutput> {
    Equalizer::new(config.clone())?.run(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: RunMode, width: usize) -> PipelineConfig {
        PipelineConfig::default()
            .with_mode(mode)
            .with_segment_width(width)
    }

    #[test]
    fn test_mode_ids() {
        assert_eq!(RunMode::from_id(0), RunMode::Auto);
        assert_eq!(RunMode::from_id(1), RunMode::OptimizedA);
        assert_eq!(RunMode::from_id(2), RunMode::OptimizedB);
        assert_eq!(RunMode::from_id(3), RunMode::Basic);
        assert_eq!(RunMode::from_id(-7), RunMode::Basic);
        assert_eq!(RunMode::from_id(RunMode::OptimizedA.id()), RunMode::OptimizedA);
    }

    #[test]
    fn test_auto_8_bit_single_group() {
        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::Auto, 256));
        assert_eq!(plan.histogram, HistogramStrategy::Local);
        assert_eq!(plan.scan.strategy, ScanStrategy::HillisSteele);
        assert_eq!(plan.scan.layout, ScanLayout::SingleGroup);
        assert!(plan.fallbacks.is_empty());
    }

    #[test]
    fn test_auto_16_bit_power_of_two_blocks() {
        let plan = ExecutionPlan::select(BitDepth::Sixteen, &config(RunMode::Auto, 256));
        assert_eq!(plan.histogram, HistogramStrategy::Global);
        assert_eq!(plan.block_count(), Some(256));
        assert_eq!(plan.block_scan(), Some(ScanStrategy::Blelloch));
        assert!(plan.fallbacks.is_empty());
    }

    #[test]
    fn test_non_power_of_two_blocks_fall_back_to_serial() {
        let cfg = config(RunMode::OptimizedA, 192);
        assert!(!cfg.block_count_is_power_of_two(65536));

        let plan = ExecutionPlan::select(BitDepth::Sixteen, &cfg);
        assert_eq!(plan.block_count(), Some(342));
        assert_eq!(plan.block_scan(), Some(ScanStrategy::Serial));
        assert_eq!(plan.scan.strategy, ScanStrategy::HillisSteele);
        assert!(plan
            .fallbacks
            .contains(&Fallback::BlockCountNotPowerOfTwo { block_count: 342 }));
        assert!(plan
            .fallbacks
            .contains(&Fallback::SegmentWidthNotPowerOfTwo { segment_width: 192 }));
        assert_eq!(plan.mode, RunMode::OptimizedA);
    }

    #[test]
    fn test_too_many_blocks_fall_back_to_serial() {
        let plan = ExecutionPlan::select(BitDepth::Sixteen, &config(RunMode::Auto, 128));
        assert_eq!(plan.block_count(), Some(512));
        assert_eq!(plan.block_scan(), Some(ScanStrategy::Serial));
        assert_eq!(
            plan.fallbacks,
            vec![Fallback::BlockCountExceedsGroup {
                block_count: 512,
                segment_width: 128
            }]
        );
    }

    #[test]
    fn test_optimized_a_uses_blelloch_segments() {
        let plan = ExecutionPlan::select(BitDepth::Sixteen, &config(RunMode::OptimizedA, 1024));
        assert_eq!(plan.scan.strategy, ScanStrategy::Blelloch);
        assert_eq!(plan.block_count(), Some(64));
        assert_eq!(plan.block_scan(), Some(ScanStrategy::Blelloch));
    }

    #[test]
    fn test_optimized_a_single_group_ignores_odd_width() {
        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::OptimizedA, 1000));
        assert_eq!(plan.scan.strategy, ScanStrategy::Blelloch);
        assert_eq!(plan.scan.layout, ScanLayout::SingleGroup);
        assert!(plan.fallbacks.is_empty());
    }

    #[test]
    fn test_optimized_b_has_no_block_stage() {
        let plan = ExecutionPlan::select(BitDepth::Sixteen, &config(RunMode::OptimizedB, 256));
        assert_eq!(plan.scan.strategy, ScanStrategy::Blelloch);
        assert!(!plan.is_segmented());
        assert_eq!(
            plan.fallbacks,
            vec![Fallback::GroupExceedsSegmentWidth {
                group_width: 65536,
                segment_width: 256,
            }]
        );
    }

    #[test]
    fn test_optimized_b_8_bit_fits_group() {
        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::OptimizedB, 256));
        assert!(plan.fallbacks.is_empty());

        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::OptimizedB, 64));
        assert_eq!(
            plan.fallbacks,
            vec![Fallback::GroupExceedsSegmentWidth {
                group_width: 256,
                segment_width: 64,
            }]
        );
    }

    #[test]
    fn test_basic_plan() {
        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::Basic, 256));
        assert_eq!(plan.histogram, HistogramStrategy::Global);
        assert_eq!(plan.scan.strategy, ScanStrategy::Serial);
        assert!(!plan.is_segmented());
    }

    #[test]
    fn test_8_bit_segmented_when_width_small() {
        let plan = ExecutionPlan::select(BitDepth::Eight, &config(RunMode::Auto, 64));
        assert_eq!(plan.block_count(), Some(4));
        assert_eq!(plan.block_scan(), Some(ScanStrategy::Blelloch));
    }

    #[test]
    fn test_zero_segment_width_rejected() {
        let err = Equalizer::new(config(RunMode::Auto, 0)).unwrap_err();
        assert!(matches!(err, EqualizeError::InvalidConfig(_)));
    }

    #[test]
    fn test_run_outputs_block_sums_only_when_segmented() {
        let data: Vec<u16> = (0..4096).map(|i| (i * 37 % 65536) as u16).collect();
        let img = Image::from_u16(64, 64, 1, data).unwrap();

        let segmented = equalize(&img, &config(RunMode::Auto, 256)).unwrap();
        assert_eq!(segmented.block_sums.as_ref().map(|b| b.len()), Some(256));
        assert_eq!(segmented.scanned_block_sums.as_ref().map(|b| b.len()), Some(256));

        let whole = equalize(&img, &config(RunMode::OptimizedB, 256)).unwrap();
        assert!(whole.block_sums.is_none());
        assert_eq!(whole.cumulative, segmented.cumulative);
    }

    #[test]
    fn test_dedicated_workers() {
        let img = Image::from_u8(2, 2, 1, vec![0, 64, 128, 255]).unwrap();
        let eq = Equalizer::new(PipelineConfig::default().with_worker_threads(2)).unwrap();
        assert_eq!(eq.backend().threads(), 2);
        let out = eq.run(&img).unwrap();
        assert_eq!(out.cumulative.total(), 4);
    }
}
