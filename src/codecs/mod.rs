//! Codec capability interface and the adapters that implement it.
//!
//! A codec backend is a [`AnimCodec`] registered by name in a
//! [`CodecRegistry`](crate::CodecRegistry). Sessions talk to it only through
//! the traits in this module; each adapter translates its library's result
//! codes into a [`CodecFailure`].

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::any::Any;
use core::fmt;
use core::ops::RangeInclusive;

use crate::config::{ImageDescriptor, Subsampling, Upsampling, YuvRange};
use crate::pixel::{PixelMode, RgbImage};
use crate::{CodecFailure, CodecStatus, Metadata};

#[cfg(test)]
pub(crate) mod mock;

#[cfg(feature = "webp")]
pub(crate) mod webp;

#[cfg(feature = "webp")]
pub(crate) mod webp_dec;

#[cfg(feature = "webp")]
pub(crate) mod webp_enc;

#[cfg(feature = "webp")]
pub(crate) mod webp_still;

/// Operations a codec advertises.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Can create encoders.
    pub encode: bool,
    /// Can create decoders.
    pub decode: bool,
}

/// Resolved encoder parameters, already clamped to the codec's ranges.
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    /// Canvas format.
    pub canvas: ImageDescriptor,
    /// Best allowed quantizer.
    pub qmin: u8,
    /// Worst allowed quantizer.
    pub qmax: u8,
    /// Encoder speed.
    pub speed: u8,
    /// Worker threads the codec may use.
    pub threads: usize,
    /// Ticks per second of frame durations.
    pub timescale: u64,
    /// Animation loop count, 0 loops forever.
    pub loop_count: u32,
    /// Blobs to attach to the container.
    pub metadata: Metadata,
}

/// Resolved decoder parameters.
#[derive(Clone, Debug)]
pub struct DecoderSettings {
    /// Chroma upsampling.
    pub upsampling: Upsampling,
    /// Worker threads the codec may use.
    pub threads: usize,
}

/// Per-frame flags for [`SequenceEncoder::add_image`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddImageFlags {
    /// This is the only frame of the sequence.
    pub single: bool,
}

/// Snapshot of a parsed container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Number of frames.
    pub frame_count: u32,
    /// Whether any frame carries alpha.
    pub has_alpha: bool,
    /// Animation loop count, 0 loops forever.
    pub loop_count: u32,
    /// ICC, EXIF and XMP boxes.
    pub metadata: Metadata,
}

/// Timing of a decoded frame, in ticks of `timescale` per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    /// Ticks per second.
    pub timescale: u64,
    /// Presentation timestamp.
    pub pts: u64,
    /// Display duration.
    pub duration: u64,
}

/// An image buffer allocated by a codec.
pub trait CodecImage: Send {
    /// Format the buffer was allocated with.
    fn descriptor(&self) -> &ImageDescriptor;

    /// Concrete type, for the encoder that allocated it.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A multi-frame encoder handle.
pub trait SequenceEncoder: Send {
    /// Allocate an image buffer with the given format.
    fn new_image(&self, descriptor: &ImageDescriptor) -> Result<Box<dyn CodecImage>, CodecFailure>;

    /// Convert interleaved RGB(A) pixels into `image`.
    fn rgb_to_yuv(&self, image: &mut dyn CodecImage, rgb: &RgbImage<'_>) -> Result<(), CodecFailure>;

    /// Append `image` to the sequence. `duration` is in settings timescale ticks.
    fn add_image(
        &mut self,
        image: &mut dyn CodecImage,
        duration: u64,
        flags: AddImageFlags,
    ) -> Result<(), CodecFailure>;

    /// Complete the bitstream.
    fn finish(&mut self) -> Result<alloc::vec::Vec<u8>, CodecFailure>;
}

/// A multi-frame decoder handle over a parsed container.
pub trait SequenceDecoder: Send {
    /// Container snapshot taken at parse time.
    fn container(&self) -> &ContainerInfo;

    /// Decode frame `index`, making it current for [`yuv_to_rgb`](Self::yuv_to_rgb).
    fn nth_image(&mut self, index: u32) -> Result<FrameTiming, CodecFailure>;

    /// Convert the current frame into `out`, which holds exactly
    /// `width * height * mode.channels()` bytes.
    fn yuv_to_rgb(&mut self, mode: PixelMode, out: &mut [u8]) -> Result<(), CodecFailure>;
}

/// A registered codec backend.
pub trait AnimCodec: Send + Sync + fmt::Debug {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Library version string.
    fn version(&self) -> String;

    /// Operations this backend supports.
    fn capabilities(&self) -> Capabilities;

    /// Quantizer scale accepted by [`new_encoder`](Self::new_encoder).
    fn quantizer_range(&self) -> RangeInclusive<u8>;

    /// Speed scale accepted by [`new_encoder`](Self::new_encoder).
    fn speed_range(&self) -> RangeInclusive<u8>;

    /// Subsampling and range pairs the encoder stores as given, in order of
    /// preference. A subsampling's first entry is its native range.
    fn encodable_formats(&self) -> &'static [(Subsampling, YuvRange)] {
        ALL_FORMATS
    }

    /// Upsampling filters the decoder can apply.
    fn upsamplings(&self) -> &'static [Upsampling] {
        &Upsampling::ALL
    }

    /// Create an encoder handle.
    fn new_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn SequenceEncoder>, CodecFailure>;

    /// Parse `data` and create a decoder handle over it.
    ///
    /// The decoder keeps `data` alive for as long as it exists.
    fn new_decoder(
        &self,
        data: Arc<[u8]>,
        settings: &DecoderSettings,
    ) -> Result<Box<dyn SequenceDecoder>, CodecFailure>;
}

/// Reject EXIF payloads without a TIFF header.
///
/// A leading `Exif\0\0` marker is allowed and skipped.
pub fn check_exif(exif: &[u8]) -> Result<(), CodecFailure> {
    let tiff = exif.strip_prefix(b"Exif\0\0").unwrap_or(exif);
    if tiff.starts_with(b"II*\0") || tiff.starts_with(b"MM\0*") {
        Ok(())
    } else {
        Err(CodecFailure::new(CodecStatus::InvalidExifPayload))
    }
}

/// Every subsampling with every range.
pub const ALL_FORMATS: &[(Subsampling, YuvRange)] = &[
    (Subsampling::Yuv420, YuvRange::Full),
    (Subsampling::Yuv420, YuvRange::Limited),
    (Subsampling::Yuv400, YuvRange::Full),
    (Subsampling::Yuv400, YuvRange::Limited),
    (Subsampling::Yuv422, YuvRange::Full),
    (Subsampling::Yuv422, YuvRange::Limited),
    (Subsampling::Yuv444, YuvRange::Full),
    (Subsampling::Yuv444, YuvRange::Limited),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_needs_tiff_header() {
        assert!(check_exif(b"II*\0\x08\0\0\0").is_ok());
        assert!(check_exif(b"MM\0*\0\0\0\x08").is_ok());
        assert!(check_exif(b"Exif\0\0II*\0\x08\0\0\0").is_ok());
        let err = check_exif(b"invalid").unwrap_err();
        assert_eq!(err.status, CodecStatus::InvalidExifPayload);
    }

    #[test]
    fn every_pair_is_listed_once() {
        for (i, pair) in ALL_FORMATS.iter().enumerate() {
            assert!(!ALL_FORMATS[i + 1..].contains(pair), "{pair:?}");
        }
        assert_eq!(ALL_FORMATS.len(), 8);
    }
}
