//! Apply a lookup table to every sample.

use ndarray::Array3;
use rayon::prelude::*;

use super::lut::LookupTable;
use crate::error::{EqualizeError, Result};
use crate::image::{Image, Samples};

/// Map every sample of `image` through `lut`.
///
/// The output has the input's shape and bit depth. Alpha is not treated
/// specially: all channels share one histogram, so all are remapped.
pub fn remap(image: &Image, lut: &LookupTable) -> Result<Image> {
    let bin_count = image.bit_depth().bin_count();
    if lut.len() != bin_count {
        return Err(EqualizeError::Backend(format!(
            "lookup table has {} entries, expected {bin_count}",
            lut.len()
        )));
    }

    let dim = image.dim();
    let entries = lut.entries();

    match image.samples() {
        Samples::U8(a) => {
            let src = a.as_slice().ok_or_else(non_contiguous)?;
            // Entries of a 256-bin table never exceed 255.
            let out: Vec<u8> = src
                .par_iter()
                .map(|&s| entries[s as usize] as u8)
                .collect();
            let array = Array3::from_shape_vec(dim, out)
                .map_err(|e| EqualizeError::Backend(format!("{e}")))?;
            Image::from_array_u8(array)
        }
        Samples::U16(a) => {
            let src = a.as_slice().ok_or_else(non_contiguous)?;
            let out: Vec<u16> = src.par_iter().map(|&s| entries[s as usize]).collect();
            let array = Array3::from_shape_vec(dim, out)
                .map_err(|e| EqualizeError::Backend(format!("{e}")))?;
            Image::from_array_u16(array)
        }
    }
}

fn non_contiguous() -> EqualizeError {
    EqualizeError::Backend("sample buffer is not contiguous".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equalize::lut::generate_lut;
    use crate::equalize::scan::{serial_inclusive, CumulativeHistogram};

    fn lut_from(hist: Vec<u64>) -> LookupTable {
        let bins = hist.len();
        let ch = CumulativeHistogram::from_bins(serial_inclusive(&hist));
        let total = ch.total();
        generate_lut(&ch, bins, total).unwrap()
    }

    #[test]
    fn test_remap_u8() {
        let img = Image::from_u8(1, 4, 1, vec![2, 2, 4, 4]).unwrap();
        let mut hist = vec![0; 256];
        hist[2] = 2;
        hist[4] = 2;
        let out = remap(&img, &lut_from(hist)).unwrap();
        assert_eq!(out.as_u8().unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_remap_u16_keeps_precision() {
        let img = Image::from_u16(2, 1, 1, vec![1000, 1001]).unwrap();
        let mut hist = vec![0; 65536];
        hist[1000] = 1;
        hist[1001] = 1;
        let out = remap(&img, &lut_from(hist)).unwrap();
        let view = out.as_u16().unwrap();
        assert_eq!(view[[0, 0, 0]], 0);
        assert_eq!(view[[1, 0, 0]], 65535);
        assert_eq!(out.dim(), (2, 1, 1));
    }

    #[test]
    fn test_remap_rejects_wrong_table() {
        let img = Image::from_u16(1, 1, 1, vec![5]).unwrap();
        let lut = lut_from(vec![1; 256]);
        assert!(remap(&img, &lut).is_err());
    }
}
