//! Image container handed to the equalization pipeline.
//!
//! ## Layout
//! Samples are stored as `(height, width, channels)` arrays in standard
//! (row-major, channel-interleaved) layout:
//! - **Grayscale**: (height, width, 1)
//! - **RGB**: (height, width, 3)
//! - **RGBA**: (height, width, 4)
//!
//! ## Bit Depths
//! - `u8`: 8-bit per sample (0-255), 256 histogram bins
//! - `u16`: 16-bit per sample (0-65535), 65536 histogram bins

use ndarray::{Array3, ArrayView3};

use crate::error::{EqualizeError, Result};

/// Per-sample bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Number of histogram bins needed to count every intensity.
    pub fn bin_count(self) -> usize {
        match self {
            BitDepth::Eight => 256,
            BitDepth::Sixteen => 65536,
        }
    }

    /// Largest representable intensity.
    pub fn max_value(self) -> u16 {
        match self {
            BitDepth::Eight => u8::MAX as u16,
            BitDepth::Sixteen => u16::MAX,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }
}

/// Raw sample storage, tagged by bit depth.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Array3<u8>),
    U16(Array3<u16>),
}

/// Immutable pipeline input (and output).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    samples: Samples,
}

impl Image {
    /// Build an 8-bit image from a flat interleaved buffer.
    ///
    /// # Arguments
    /// * `height` - Image height in pixels
    /// * `width` - Image width in pixels
    /// * `channels` - Samples per pixel (1, 3, 4, ...)
    /// * `data` - Flat buffer of length `height * width * channels`
    pub fn from_u8(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        check_channels(channels)?;
        let array = Array3::from_shape_vec((height, width, channels), data)
            .map_err(|e| EqualizeError::InvalidImage(format!("{e}")))?;
        Ok(Self { samples: Samples::U8(array) })
    }

    /// Build a 16-bit image from a flat interleaved buffer.
    pub fn from_u16(height: usize, width: usize, channels: usize, data: Vec<u16>) -> Result<Self> {
        check_channels(channels)?;
        let array = Array3::from_shape_vec((height, width, channels), data)
            .map_err(|e| EqualizeError::InvalidImage(format!("{e}")))?;
        Ok(Self { samples: Samples::U16(array) })
    }

    /// Wrap an existing 8-bit array. Non-standard layouts are copied.
    pub fn from_array_u8(array: Array3<u8>) -> Result<Self> {
        check_channels(array.dim().2)?;
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Ok(Self { samples: Samples::U8(array) })
    }

    /// Wrap an existing 16-bit array. Non-standard layouts are copied.
    pub fn from_array_u16(array: Array3<u16>) -> Result<Self> {
        check_channels(array.dim().2)?;
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Ok(Self { samples: Samples::U16(array) })
    }

    pub fn height(&self) -> usize {
        self.dim().0
    }

    pub fn width(&self) -> usize {
        self.dim().1
    }

    pub fn channels(&self) -> usize {
        self.dim().2
    }

    /// `(height, width, channels)`
    pub fn dim(&self) -> (usize, usize, usize) {
        match &self.samples {
            Samples::U8(a) => a.dim(),
            Samples::U16(a) => a.dim(),
        }
    }

    pub fn bit_depth(&self) -> BitDepth {
        match &self.samples {
            Samples::U8(_) => BitDepth::Eight,
            Samples::U16(_) => BitDepth::Sixteen,
        }
    }

    /// Total number of samples (pixels × channels).
    pub fn sample_count(&self) -> usize {
        let (h, w, c) = self.dim();
        h * w * c
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn into_samples(self) -> Samples {
        self.samples
    }

    pub fn as_u8(&self) -> Option<ArrayView3<'_, u8>> {
        match &self.samples {
            Samples::U8(a) => Some(a.view()),
            Samples::U16(_) => None,
        }
    }

    pub fn as_u16(&self) -> Option<ArrayView3<'_, u16>> {
        match &self.samples {
            Samples::U16(a) => Some(a.view()),
            Samples::U8(_) => None,
        }
    }

    /// Convert a 16-bit image whose samples all fit in 8 bits into an 8-bit
    /// image, so it is equalized over 256 bins instead of 65536.
    ///
    /// Images that are already 8-bit, or that use the upper range, are
    /// returned unchanged.
    pub fn narrowed(&self) -> Image {
        match &self.samples {
            Samples::U16(a) if a.iter().all(|&v| v <= u8::MAX as u16) => Image {
                samples: Samples::U8(a.mapv(|v| v as u8)),
            },
            _ => self.clone(),
        }
    }
}

fn check_channels(channels: usize) -> Result<()> {
    if channels == 0 {
        return Err(EqualizeError::InvalidImage(
            "channel count must be non-zero".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_shape() {
        let img = Image::from_u8(2, 3, 1, vec![0; 6]).unwrap();
        assert_eq!(img.dim(), (2, 3, 1));
        assert_eq!(img.sample_count(), 6);
        assert_eq!(img.bit_depth(), BitDepth::Eight);
    }

    #[test]
    fn test_from_u16_length_mismatch() {
        let err = Image::from_u16(2, 2, 3, vec![0; 11]).unwrap_err();
        assert!(matches!(err, EqualizeError::InvalidImage(_)));
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(Image::from_u8(1, 1, 0, vec![]).is_err());
    }

    #[test]
    fn test_non_standard_layout_is_copied() {
        let mut a = Array3::<u8>::zeros((2, 3, 1));
        a[[0, 2, 0]] = 7;
        let t = a.permuted_axes([1, 0, 2]);
        let img = Image::from_array_u8(t).unwrap();
        let view = img.as_u8().unwrap();
        assert!(view.is_standard_layout());
        assert_eq!(view[[2, 0, 0]], 7);
    }

    #[test]
    fn test_narrowed_low_range_u16() {
        let img = Image::from_u16(1, 2, 1, vec![12, 255]).unwrap();
        let narrow = img.narrowed();
        assert_eq!(narrow.bit_depth(), BitDepth::Eight);
        assert_eq!(narrow.as_u8().unwrap()[[0, 1, 0]], 255);
    }

    #[test]
    fn test_narrowed_keeps_full_range_u16() {
        let img = Image::from_u16(1, 2, 1, vec![12, 256]).unwrap();
        assert_eq!(img.narrowed().bit_depth(), BitDepth::Sixteen);
    }

    #[test]
    fn test_bit_depth_bins() {
        assert_eq!(BitDepth::Eight.bin_count(), 256);
        assert_eq!(BitDepth::Sixteen.bin_count(), 65536);
        assert_eq!(BitDepth::Sixteen.max_value(), 65535);
    }
}
