//! HistEq Rust Extensions
//!
//! Parallel histogram equalization implemented in Rust, with Python
//! bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Image Format
//! Images are `(height, width, channels)` arrays with any channel count:
//! - **Grayscale**: (height, width, 1)
//! - **RGB**: (height, width, 3)
//! - **RGBA**: (height, width, 4)
//!
//! Both bit depths are supported:
//! - `u8`: 8-bit per sample (0-255), 256 bins
//! - `u16`: 16-bit per sample (0-65535), 65536 bins
//!
//! All channels share one histogram.
//!
//! ## Pipeline
//! histogram → cumulative histogram (prefix scan) → lookup table → remap.
//! The scan is Serial, Hillis-Steele or Blelloch, chosen once per run from
//! the bit depth, the requested [`RunMode`] and the backend's segment width.
//!
//! ```
//! use histeq_rust::{equalize, Image, PipelineConfig, RunMode};
//!
//! let image = Image::from_u8(2, 2, 1, vec![10, 10, 20, 40]).unwrap();
//! let config = PipelineConfig::default().with_mode(RunMode::Auto);
//! let output = equalize(&image, &config).unwrap();
//! assert_eq!(output.cumulative.total(), 4);
//! ```

pub mod compute;
pub mod equalize;
pub mod error;
pub mod image;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use equalize::{
    equalize, BlockSums, Count, CumulativeHistogram, EqualizeOutput, Equalizer, ExecutionPlan,
    Fallback, Histogram, HistogramStrategy, LookupTable, PipelineConfig, RunMode,
    ScannedBlockSums, ScanStrategy,
};
pub use error::{EqualizeError, Result};
pub use image::{BitDepth, Image, Samples};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    use crate::{equalize, EqualizeError, Image, PipelineConfig, RunMode, Samples};

    fn to_py_err(err: EqualizeError) -> PyErr {
        match err {
            EqualizeError::InvalidImage(_) | EqualizeError::InvalidConfig(_) => {
                PyValueError::new_err(err.to_string())
            }
            EqualizeError::Backend(_) => PyRuntimeError::new_err(err.to_string()),
        }
    }

    fn config(mode: i32, segment_width: usize) -> PipelineConfig {
        PipelineConfig::default()
            .with_mode(RunMode::from_id(mode))
            .with_segment_width(segment_width)
    }

    // ========================================================================
    // Histogram Equalization
    // ========================================================================

    /// Equalize a u8 image (1, 3, or 4 channels).
    ///
    /// # Arguments
    /// * `image` - Input image (height, width, channels)
    /// * `mode` - 0 auto, 1 optimized A, 2 optimized B, other basic
    /// * `segment_width` - Maximum work-group size of the backend
    #[pyfunction]
    #[pyo3(signature = (image, mode=0, segment_width=256))]
    pub fn equalize_histogram<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        mode: i32,
        segment_width: usize,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let input = Image::from_array_u8(image.as_array().to_owned()).map_err(to_py_err)?;
        let config = config(mode, segment_width);
        let output = py
            .allow_threads(|| equalize(&input, &config))
            .map_err(to_py_err)?;
        match output.image.into_samples() {
            Samples::U8(result) => Ok(result.into_pyarray(py)),
            Samples::U16(_) => Err(PyRuntimeError::new_err("unexpected 16-bit output")),
        }
    }

    /// Equalize a u16 image over 65536 bins.
    #[pyfunction]
    #[pyo3(signature = (image, mode=0, segment_width=256))]
    pub fn equalize_histogram_u16<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u16>,
        mode: i32,
        segment_width: usize,
    ) -> PyResult<Bound<'py, PyArray3<u16>>> {
        let input = Image::from_array_u16(image.as_array().to_owned()).map_err(to_py_err)?;
        let config = config(mode, segment_width);
        let output = py
            .allow_threads(|| equalize(&input, &config))
            .map_err(to_py_err)?;
        match output.image.into_samples() {
            Samples::U16(result) => Ok(result.into_pyarray(py)),
            Samples::U8(_) => Err(PyRuntimeError::new_err("unexpected 8-bit output")),
        }
    }

    /// HistEq Rust extension module
    #[pymodule]
    pub fn histeq_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(equalize_histogram, m)?)?;
        m.add_function(wrap_pyfunction!(equalize_histogram_u16, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::histeq_rust;
