//! Still-image WebP through libwebp's simple encode and decode calls.

use alloc::vec::Vec;
use core::ptr;

use libwebp_sys2 as sys;

use super::webp::{WebpBuffer, check_signature, to_c_int, vp8_status};
use crate::pixel::PixelMode;
use crate::{CodecFailure, CodecStatus};

/// Header facts needed before decoding.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StillInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) has_alpha: bool,
}

/// Lossy-encode `height` rows of `stride` bytes.
///
/// The caller guarantees `stride >= width * channels` and
/// `stride * height <= pixels.len()`.
pub(crate) fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    mode: PixelMode,
    quality: f32,
) -> Result<Vec<u8>, CodecFailure> {
    let w = to_c_int(width, "width")?;
    let h = to_c_int(height, "height")?;
    let s = to_c_int(stride, "stride")?;
    let mut out: *mut u8 = ptr::null_mut();
    // SAFETY: the caller checked that `pixels` holds `stride * height` bytes.
    let size = unsafe {
        match mode {
            PixelMode::Rgb => sys::WebPEncodeRGB(pixels.as_ptr(), w, h, s, quality, &mut out),
            PixelMode::Rgba => sys::WebPEncodeRGBA(pixels.as_ptr(), w, h, s, quality, &mut out),
        }
    };
    // SAFETY: on success `out` holds `size` bytes allocated by libwebp; on
    // failure it is null or must still be freed.
    let buffer = unsafe { WebpBuffer::from_raw(out, size) };
    if size == 0 {
        return Err(CodecStatus::EncodeFailed.into());
    }
    Ok(buffer.to_vec())
}

/// Parse the header without decoding pixels.
pub(crate) fn read_header(data: &[u8]) -> Result<StillInfo, CodecFailure> {
    check_signature(data)?;
    // SAFETY: plain data filled in by WebPGetFeatures.
    let mut features: sys::WebPBitstreamFeatures = unsafe { core::mem::zeroed() };
    // SAFETY: `data` is valid for `data.len()` bytes.
    let status = unsafe { sys::WebPGetFeatures(data.as_ptr(), data.len(), &mut features) };
    if status != sys::VP8_STATUS_OK {
        return Err(vp8_status(status).into());
    }
    if features.has_animation != 0 {
        return Err(CodecFailure::with_detail(
            CodecStatus::NotImplemented,
            "animated file; use an animation decoder",
        ));
    }
    let width = u32::try_from(features.width).map_err(|_| CodecStatus::BitstreamParseFailed)?;
    let height = u32::try_from(features.height).map_err(|_| CodecStatus::BitstreamParseFailed)?;
    Ok(StillInfo {
        width,
        height,
        has_alpha: features.has_alpha != 0,
    })
}

/// Decode into `out`, which holds `info.height` rows of `width * channels` bytes.
pub(crate) fn decode_into(
    data: &[u8],
    info: &StillInfo,
    mode: PixelMode,
    out: &mut [u8],
) -> Result<(), CodecFailure> {
    let stride = to_c_int(info.width as usize * mode.channels() as usize, "stride")?;
    // SAFETY: `out` is exactly `stride * height` bytes and libwebp writes
    // within the size it is given.
    let written = unsafe {
        match mode {
            PixelMode::Rgb => sys::WebPDecodeRGBInto(data.as_ptr(), data.len(), out.as_mut_ptr(), out.len(), stride),
            PixelMode::Rgba => sys::WebPDecodeRGBAInto(data.as_ptr(), data.len(), out.as_mut_ptr(), out.len(), stride),
        }
    };
    if written.is_null() {
        return Err(CodecFailure::with_detail(
            CodecStatus::BitstreamParseFailed,
            "could not decode bitstream",
        ));
    }
    Ok(())
}
