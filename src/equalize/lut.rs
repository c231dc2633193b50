//! Tone-mapping lookup table from a cumulative histogram.
//!
//! Bin `i` maps to
//!
//! ```text
//! round((CH[i] - cmin) / (N - cmin) * max)
//! ```
//!
//! clipped to `[0, max]`, where `cmin` is the first non-zero cumulative
//! value, `N` the sample count and `max = bins - 1`.

use rayon::prelude::*;

use super::scan::CumulativeHistogram;
use super::Count;
use crate::error::{EqualizeError, Result};

/// Output intensity for every input intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    entries: Vec<u16>,
}

impl LookupTable {
    pub fn entries(&self) -> &[u16] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, bin: usize) -> u16 {
        self.entries[bin]
    }

    /// Largest value an entry may take.
    pub fn max_value(&self) -> u16 {
        self.entries.len().saturating_sub(1) as u16
    }
}

/// Normalize a cumulative histogram into a lookup table.
///
/// An image whose samples all share one intensity (or an empty image) has
/// nothing to redistribute and gets the identity table.
///
/// # Arguments
/// * `cumulative` - Inclusive cumulative histogram, `bin_count` entries
/// * `bin_count` - 256 or 65536
/// * `total` - Number of samples counted
pub fn generate_lut(
    cumulative: &CumulativeHistogram,
    bin_count: usize,
    total: Count,
) -> Result<LookupTable> {
    if cumulative.len() != bin_count {
        return Err(EqualizeError::Backend(format!(
            "cumulative histogram has {} bins, expected {bin_count}",
            cumulative.len()
        )));
    }
    if bin_count == 0 || bin_count > u16::MAX as usize + 1 {
        return Err(EqualizeError::InvalidConfig(format!(
            "unsupported bin count {bin_count}"
        )));
    }

    let max = (bin_count - 1) as f64;
    let cmin = cumulative.min_nonzero();

    if total == 0 || cmin >= total {
        let entries = (0..bin_count).map(|i| i as u16).collect();
        return Ok(LookupTable { entries });
    }

    let range = (total - cmin) as f64;
    let entries = cumulative
        .bins()
        .par_iter()
        .map(|&c| {
            if c <= cmin {
                0
            } else {
                ((c - cmin) as f64 / range * max).round().clamp(0.0, max) as u16
            }
        })
        .collect();

    Ok(LookupTable { entries })
}
