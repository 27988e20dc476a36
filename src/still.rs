//! Stateless still-image encode and decode.
//!
//! Lossy WebP through libwebp. Argument problems, codec failures and
//! oversized outputs are reported as distinct [`ErrorKind`](crate::ErrorKind)s.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use crate::codecs::webp_still;
use crate::pixel::{Frame, PixelMode};
use crate::{CodecError, Limits, TIMESCALE};

/// A decoded still image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    /// Interleaved pixels, `width * height * mode.channels()` bytes.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout of `pixels`.
    pub mode: PixelMode,
}

impl From<DecodedImage> for Frame {
    fn from(image: DecodedImage) -> Self {
        Frame {
            pixels: image.pixels,
            width: image.width,
            height: image.height,
            mode: image.mode,
            timescale: TIMESCALE,
            pts: 0,
            duration: 0,
        }
    }
}

/// Encode `height` rows of `stride` bytes of RGB pixels.
///
/// `quality` runs from 0 (smallest) to 100 (best); libwebp defines what
/// values outside that range do.
///
/// ```no_run
/// let rgb = vec![128u8; 16 * 16 * 3];
/// let webp = zenframes::encode_rgb(&rgb, 16, 16, 16 * 3, 80.0)?;
/// let image = zenframes::decode_rgb(&webp)?;
/// assert_eq!((image.width, image.height), (16, 16));
/// # Ok::<(), zenframes::CodecError>(())
/// ```
pub fn encode_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    quality: f32,
) -> Result<Vec<u8>, CodecError> {
    encode(pixels, width, height, stride, PixelMode::Rgb, quality)
}

/// Encode `height` rows of `stride` bytes of RGBA pixels.
pub fn encode_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    quality: f32,
) -> Result<Vec<u8>, CodecError> {
    encode(pixels, width, height, stride, PixelMode::Rgba, quality)
}

fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    mode: PixelMode,
    quality: f32,
) -> Result<Vec<u8>, CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::Value(format!(
            "invalid image dimensions: {width}x{height}"
        )));
    }
    let row_bytes = width as usize * mode.channels() as usize;
    if stride < row_bytes {
        return Err(CodecError::Argument(format!(
            "stride {stride} is smaller than a row of {row_bytes} bytes"
        )));
    }
    let needed = stride
        .checked_mul(height as usize)
        .ok_or_else(|| CodecError::Memory("Integer overflow in pixel size".into()))?;
    if needed > pixels.len() {
        return Err(CodecError::Argument(format!(
            "buffer of {} bytes is smaller than stride * height = {needed}",
            pixels.len()
        )));
    }

    let out = webp_still::encode(pixels, width, height, stride, mode, quality)
        .map_err(|e| CodecError::from_codec("Failed to encode image", e))?;
    tracing::debug!(width, height, %mode, quality, bytes = out.len(), "still image encoded");
    Ok(out)
}

/// Decode to RGB.
pub fn decode_rgb(data: &[u8]) -> Result<DecodedImage, CodecError> {
    decode(data, PixelMode::Rgb, &Limits::none())
}

/// Decode to RGBA.
pub fn decode_rgba(data: &[u8]) -> Result<DecodedImage, CodecError> {
    decode(data, PixelMode::Rgba, &Limits::none())
}

/// Decode to `mode`, refusing images whose buffer would exceed `limits`.
pub fn decode_with_limits(
    data: &[u8],
    mode: PixelMode,
    limits: &Limits,
) -> Result<DecodedImage, CodecError> {
    decode(data, mode, limits)
}

fn decode(data: &[u8], mode: PixelMode, limits: &Limits) -> Result<DecodedImage, CodecError> {
    let info = webp_still::read_header(data).map_err(|e| CodecError::from_codec("Failed to decode image", e))?;
    // Size the output from the header before allocating anything.
    let len = limits.validate(info.width, info.height, mode.channels())?;
    let mut pixels = vec![0u8; len];
    webp_still::decode_into(data, &info, mode, &mut pixels)
        .map_err(|e| CodecError::from_codec("Failed to decode image", e))?;
    tracing::debug!(
        width = info.width,
        height = info.height,
        has_alpha = info.has_alpha,
        %mode,
        "still image decoded"
    );
    Ok(DecodedImage {
        pixels,
        width: info.width,
        height: info.height,
        mode,
    })
}
