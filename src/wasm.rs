//! WebAssembly exports for histogram equalization.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Bit Depth Support
//!
//! - **u8**: 8-bit per sample (0-255), 256 bins
//! - **u16**: 16-bit per sample (0-65535), 65536 bins
//!
//! Both versions run the same pipeline on rayon's global pool.

use wasm_bindgen::prelude::*;

use crate::{equalize, EqualizeError, Image, PipelineConfig, RunMode, Samples};

fn to_js_err(err: EqualizeError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn config(mode: i32) -> PipelineConfig {
    PipelineConfig::default().with_mode(RunMode::from_id(mode))
}

/// Equalize an 8-bit image.
///
/// # Arguments
/// * `data` - Flat interleaved samples (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - Samples per pixel
/// * `mode` - 0 auto, 1 optimized A, 2 optimized B, other basic
///
/// # Returns
/// Flat array of equalized samples
#[wasm_bindgen]
pub fn equalize_u8_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    mode: i32,
) -> Result<Vec<u8>, JsValue> {
    let input = Image::from_u8(height, width, channels, data.to_vec()).map_err(to_js_err)?;
    let output = equalize(&input, &config(mode)).map_err(to_js_err)?;
    match output.image.into_samples() {
        Samples::U8(result) => Ok(result.into_raw_vec_and_offset().0),
        Samples::U16(_) => Err(JsValue::from_str("unexpected 16-bit output")),
    }
}

/// Equalize a 16-bit image.
#[wasm_bindgen]
pub fn equalize_u16_wasm(
    data: &[u16],
    width: usize,
    height: usize,
    channels: usize,
    mode: i32,
) -> Result<Vec<u16>, JsValue> {
    let input = Image::from_u16(height, width, channels, data.to_vec()).map_err(to_js_err)?;
    let output = equalize(&input, &config(mode)).map_err(to_js_err)?;
    match output.image.into_samples() {
        Samples::U16(result) => Ok(result.into_raw_vec_and_offset().0),
        Samples::U8(_) => Err(JsValue::from_str("unexpected 8-bit output")),
    }
}
