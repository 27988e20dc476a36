//! libwebp backend: the registered codec and FFI helpers shared by the
//! still-image, encoder and decoder adapters.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ffi::{c_int, c_void};
use core::ops::RangeInclusive;

use libwebp_sys2 as sys;

use super::webp_dec::WebpAnimDecoder;
use super::webp_enc::WebpAnimEncoder;
use super::{
    AnimCodec, Capabilities, DecoderSettings, EncoderSettings, SequenceDecoder, SequenceEncoder,
};
use crate::config::{Subsampling, Upsampling, YuvRange};
use crate::{CodecFailure, CodecStatus};

/// Registry name of the libwebp backend.
pub(crate) const NAME: &str = "libwebp";

/// Animation timestamps are milliseconds.
pub(crate) const TIMESCALE: u64 = 1000;

const QUANTIZER_MAX: u8 = 63;

/// Lossy VP8 stores BT.601 limited-range 4:2:0; 4:0:0 is 4:2:0 with neutral
/// chroma. 4:4:4 switches to lossless VP8L, which keeps full-range RGB.
const FORMATS: &[(Subsampling, YuvRange)] = &[
    (Subsampling::Yuv420, YuvRange::Limited),
    (Subsampling::Yuv400, YuvRange::Limited),
    (Subsampling::Yuv444, YuvRange::Full),
];

/// `WebPAnimDecoder` always applies libwebp's fancy (bilinear) upsampler.
const UPSAMPLINGS: &[Upsampling] = &[Upsampling::Automatic, Upsampling::Best, Upsampling::Bilinear];
const METHOD_MAX: u8 = 6;

/// Animated WebP through libwebp's `WebPAnimEncoder` and `WebPAnimDecoder`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Libwebp;

impl AnimCodec for Libwebp {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> String {
        libwebp_version()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            encode: true,
            decode: true,
        }
    }

    fn quantizer_range(&self) -> RangeInclusive<u8> {
        0..=QUANTIZER_MAX
    }

    fn speed_range(&self) -> RangeInclusive<u8> {
        0..=METHOD_MAX
    }

    fn encodable_formats(&self) -> &'static [(Subsampling, YuvRange)] {
        FORMATS
    }

    fn upsamplings(&self) -> &'static [Upsampling] {
        UPSAMPLINGS
    }

    fn new_encoder(
        &self,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn SequenceEncoder>, CodecFailure> {
        Ok(Box::new(WebpAnimEncoder::new(settings)?))
    }

    fn new_decoder(
        &self,
        data: Arc<[u8]>,
        settings: &DecoderSettings,
    ) -> Result<Box<dyn SequenceDecoder>, CodecFailure> {
        Ok(Box::new(WebpAnimDecoder::new(data, settings)?))
    }
}

/// Version of the linked libwebp encoder, as `major.minor.patch`.
pub fn libwebp_version() -> String {
    // SAFETY: no arguments, returns a packed integer.
    format_version(unsafe { sys::WebPGetEncoderVersion() })
}

fn format_version(packed: c_int) -> String {
    let v = packed as u32;
    format!("{}.{}.{}", (v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}

/// Whether `subsampling` is encoded with lossless VP8L.
pub(crate) fn is_lossless(subsampling: Subsampling) -> bool {
    subsampling == Subsampling::Yuv444
}

/// Whether libwebp can encode `subsampling` at `range`.
pub(crate) fn is_encodable(subsampling: Subsampling, range: YuvRange) -> bool {
    FORMATS.contains(&(subsampling, range))
}

/// libwebp quality (0..=100) for a quantizer on the 0 (best) ..= 63 (worst) scale.
pub(crate) fn quality_for_quantizer(q: u8) -> f32 {
    100.0 - f32::from(q.min(QUANTIZER_MAX)) * 100.0 / f32::from(QUANTIZER_MAX)
}

/// libwebp `method` (0 fast ..= 6 slow) for a speed (0 slow ..= 6 fast).
pub(crate) fn method_for_speed(speed: u8) -> c_int {
    c_int::from(METHOD_MAX - speed.min(METHOD_MAX))
}

pub(crate) fn vp8_status(code: sys::VP8StatusCode) -> CodecStatus {
    match code {
        sys::VP8_STATUS_OUT_OF_MEMORY => CodecStatus::OutOfMemory,
        sys::VP8_STATUS_INVALID_PARAM => CodecStatus::InvalidArgument,
        sys::VP8_STATUS_BITSTREAM_ERROR => CodecStatus::BitstreamParseFailed,
        sys::VP8_STATUS_UNSUPPORTED_FEATURE => CodecStatus::NotImplemented,
        sys::VP8_STATUS_SUSPENDED
        | sys::VP8_STATUS_NOT_ENOUGH_DATA => CodecStatus::TruncatedData,
        _ => CodecStatus::UnknownError,
    }
}

pub(crate) fn mux_status(code: sys::WebPMuxError) -> CodecStatus {
    match code {
        sys::WEBP_MUX_MEMORY_ERROR => CodecStatus::OutOfMemory,
        sys::WEBP_MUX_BAD_DATA => CodecStatus::BitstreamParseFailed,
        sys::WEBP_MUX_NOT_ENOUGH_DATA => CodecStatus::TruncatedData,
        sys::WEBP_MUX_INVALID_ARGUMENT => CodecStatus::InvalidArgument,
        _ => CodecStatus::UnknownError,
    }
}

/// Reject anything that is not a RIFF/WEBP container.
///
/// A short input that could still grow into a valid header is truncated, not
/// mis-signed.
pub(crate) fn check_signature(data: &[u8]) -> Result<(), CodecFailure> {
    const RIFF: &[u8] = b"RIFF";
    const WEBP: &[u8] = b"WEBP";

    if !RIFF.starts_with(&data[..data.len().min(4)]) {
        return Err(CodecStatus::InvalidSignature.into());
    }
    if data.len() > 8 && !WEBP.starts_with(&data[8..data.len().min(12)]) {
        return Err(CodecStatus::InvalidSignature.into());
    }
    if data.len() < 12 {
        return Err(CodecStatus::TruncatedData.into());
    }
    Ok(())
}

/// Borrow `bytes` as a `WebPData` input descriptor.
pub(crate) fn webp_data(bytes: &[u8]) -> sys::WebPData {
    sys::WebPData {
        bytes: bytes.as_ptr(),
        size: bytes.len(),
    }
}

pub(crate) fn to_c_int(value: impl TryInto<c_int>, what: &str) -> Result<c_int, CodecFailure> {
    value
        .try_into()
        .map_err(|_| CodecFailure::with_detail(CodecStatus::InvalidArgument, format!("{what} out of range")))
}

/// Output buffer allocated by libwebp, released with `WebPFree`.
pub(crate) struct WebpBuffer {
    ptr: *mut u8,
    len: usize,
}

impl WebpBuffer {
    /// Take ownership of `len` bytes at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a libwebp allocation of at least `len` bytes that
    /// nothing else frees.
    pub(crate) unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Take ownership of a `WebPData` filled in by libwebp.
    ///
    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    pub(crate) unsafe fn from_data(data: sys::WebPData) -> Self {
        // SAFETY: forwarded from the caller.
        unsafe { Self::from_raw(data.bytes.cast_mut(), data.size) }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            return &[];
        }
        // SAFETY: non-null and `len` bytes long per `from_raw`.
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Drop for WebpBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: allocated by libwebp and owned by this guard.
            unsafe { sys::WebPFree(self.ptr.cast::<c_void>()) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_dotted_triple() {
        assert_eq!(format_version(0x01_04_00), "1.4.0");
        let linked = libwebp_version();
        assert_eq!(linked.split('.').count(), 3);
        assert!(!linked.starts_with("0.0"));
    }

    #[test]
    fn quantizer_scale_maps_onto_quality() {
        assert_eq!(quality_for_quantizer(0), 100.0);
        assert_eq!(quality_for_quantizer(63), 0.0);
        assert_eq!(quality_for_quantizer(200), 0.0);
        assert!(quality_for_quantizer(10) > quality_for_quantizer(20));
    }

    #[test]
    fn speed_inverts_method() {
        assert_eq!(method_for_speed(0), 6);
        assert_eq!(method_for_speed(6), 0);
        assert_eq!(method_for_speed(10), 0);
    }

    #[test]
    fn library_codes_map_to_statuses() {
        assert_eq!(vp8_status(sys::VP8_STATUS_OUT_OF_MEMORY), CodecStatus::OutOfMemory);
        assert_eq!(vp8_status(sys::VP8_STATUS_BITSTREAM_ERROR), CodecStatus::BitstreamParseFailed);
        assert_eq!(vp8_status(sys::VP8_STATUS_NOT_ENOUGH_DATA), CodecStatus::TruncatedData);
        assert_eq!(vp8_status(sys::VP8_STATUS_USER_ABORT), CodecStatus::UnknownError);
        assert_eq!(mux_status(sys::WEBP_MUX_BAD_DATA), CodecStatus::BitstreamParseFailed);
        assert_eq!(mux_status(sys::WEBP_MUX_INVALID_ARGUMENT), CodecStatus::InvalidArgument);
        assert_eq!(mux_status(sys::WEBP_MUX_NOT_FOUND), CodecStatus::UnknownError);
    }

    #[test]
    fn advertised_formats() {
        let codec = Libwebp;
        assert!(!codec.encodable_formats().iter().any(|(s, _)| *s == Subsampling::Yuv422));
        assert!(is_encodable(Subsampling::Yuv420, YuvRange::Limited));
        assert!(!is_encodable(Subsampling::Yuv420, YuvRange::Full));
        assert!(is_encodable(Subsampling::Yuv444, YuvRange::Full));
        assert!(is_lossless(Subsampling::Yuv444));
        assert!(!is_lossless(Subsampling::Yuv400));
        assert!(!codec.upsamplings().contains(&Upsampling::Nearest));
        assert!(codec.upsamplings().contains(&Upsampling::Automatic));
    }

    #[test]
    fn signature_classification() {
        assert!(check_signature(b"RIFF\0\0\0\0WEBPVP8 ").is_ok());
        assert_eq!(
            check_signature(b"RIF").unwrap_err().status,
            CodecStatus::TruncatedData
        );
        assert_eq!(
            check_signature(b"").unwrap_err().status,
            CodecStatus::TruncatedData
        );
        assert_eq!(
            check_signature(b"\x89PNG\r\n\x1a\n\0\0\0\0").unwrap_err().status,
            CodecStatus::InvalidSignature
        );
        assert_eq!(
            check_signature(b"RIFF\0\0\0\0WAVEfmt ").unwrap_err().status,
            CodecStatus::InvalidSignature
        );
    }

    #[test]
    fn empty_buffer_guard_is_empty() {
        // SAFETY: null is allowed and never freed.
        let buf = unsafe { WebpBuffer::from_raw(core::ptr::null_mut(), 0) };
        assert!(buf.as_slice().is_empty());
    }
}
