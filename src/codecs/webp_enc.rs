//! Animated WebP encoding through `WebPAnimEncoder`.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::any::Any;
use core::ffi::{CStr, c_int};
use core::ptr::{self, NonNull};

use libwebp_sys2 as sys;

use super::webp::{
    TIMESCALE, WebpBuffer, is_encodable, is_lossless, method_for_speed, mux_status,
    quality_for_quantizer, to_c_int, webp_data,
};
use super::{AddImageFlags, CodecImage, EncoderSettings, SequenceEncoder, check_exif};
use crate::config::{ImageDescriptor, Subsampling};
use crate::pixel::{PixelMode, RgbImage};
use crate::{CodecFailure, CodecStatus, Metadata};

/// A `WebPPicture` plus the format it was allocated with.
pub(crate) struct WebpPicture {
    pic: sys::WebPPicture,
    descriptor: ImageDescriptor,
}

// SAFETY: the picture's buffers are owned by this value alone and libwebp
// pictures carry no thread affinity.
unsafe impl Send for WebpPicture {}

impl WebpPicture {
    fn new(descriptor: &ImageDescriptor) -> Result<Self, CodecFailure> {
        // SAFETY: WebPPicture is plain data; all-zero is a valid bit pattern
        // and WebPPictureInit overwrites it.
        let mut pic: sys::WebPPicture = unsafe { core::mem::zeroed() };
        // SAFETY: `pic` is a valid, exclusively borrowed picture.
        if unsafe { sys::WebPPictureInit(&mut pic) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::UnknownError,
                "libwebp version mismatch",
            ));
        }
        pic.width = to_c_int(descriptor.width, "width")?;
        pic.height = to_c_int(descriptor.height, "height")?;
        // 4:0:0 goes through YUV so the chroma planes can be neutralised.
        pic.use_argb = c_int::from(descriptor.subsampling != Subsampling::Yuv400);
        Ok(Self {
            pic,
            descriptor: *descriptor,
        })
    }

    fn import(&mut self, rgb: &RgbImage<'_>) -> Result<(), CodecFailure> {
        let stride = to_c_int(rgb.row_bytes(), "row stride")?;
        // SAFETY: the session checked `pixels.len() == row_bytes * height`
        // and the picture dimensions equal the image's.
        let ok = unsafe {
            match rgb.mode {
                PixelMode::Rgb => sys::WebPPictureImportRGB(&mut self.pic, rgb.pixels.as_ptr(), stride),
                PixelMode::Rgba => sys::WebPPictureImportRGBA(&mut self.pic, rgb.pixels.as_ptr(), stride),
            }
        };
        if ok == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::ReformatFailed,
                "RGB to YUV import failed",
            ));
        }
        if self.descriptor.subsampling == Subsampling::Yuv400 {
            self.neutralise_chroma();
        }
        Ok(())
    }

    /// Set both chroma planes to mid-grey, leaving luma only.
    fn neutralise_chroma(&mut self) {
        if self.pic.use_argb != 0 || self.pic.u.is_null() || self.pic.v.is_null() {
            return;
        }
        let uv_width = (self.pic.width as usize).div_ceil(2);
        let uv_height = (self.pic.height as usize).div_ceil(2);
        let stride = self.pic.uv_stride as usize;
        for plane in [self.pic.u, self.pic.v] {
            for row in 0..uv_height {
                // SAFETY: libwebp allocated `uv_height` rows of `uv_stride`
                // bytes per chroma plane, and `uv_width <= uv_stride`.
                let line = unsafe { core::slice::from_raw_parts_mut(plane.add(row * stride), uv_width) };
                line.fill(128);
            }
        }
    }
}

impl Drop for WebpPicture {
    fn drop(&mut self) {
        // SAFETY: initialised by WebPPictureInit; freeing an empty picture is a no-op.
        unsafe { sys::WebPPictureFree(&mut self.pic) };
    }
}

impl CodecImage for WebpPicture {
    fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn picture(image: &mut dyn CodecImage) -> Result<&mut WebpPicture, CodecFailure> {
    image.as_any_mut().downcast_mut::<WebpPicture>().ok_or_else(|| {
        CodecFailure::with_detail(
            CodecStatus::IncompatibleImage,
            "image was not allocated by libwebp",
        )
    })
}

/// Owned `WebPAnimEncoder` handle.
pub(crate) struct WebpAnimEncoder {
    enc: NonNull<sys::WebPAnimEncoder>,
    config: sys::WebPConfig,
    metadata: Metadata,
    timescale: u64,
    /// Start of the next frame, in milliseconds.
    timestamp_ms: u64,
    frames: u32,
}

// SAFETY: the encoder handle is exclusively owned and every call goes through
// `&mut self`; libwebp encoders carry no thread affinity.
unsafe impl Send for WebpAnimEncoder {}

impl WebpAnimEncoder {
    pub(crate) fn new(settings: &EncoderSettings) -> Result<Self, CodecFailure> {
        if let Some(exif) = &settings.metadata.exif {
            check_exif(exif)?;
        }
        let canvas = &settings.canvas;
        if !is_encodable(canvas.subsampling, canvas.range) {
            return Err(CodecFailure::with_detail(
                CodecStatus::InvalidArgument,
                format!("cannot encode {} at {} range", canvas.subsampling, canvas.range),
            ));
        }
        let width = to_c_int(canvas.width, "width")?;
        let height = to_c_int(canvas.height, "height")?;

        // SAFETY: plain data, initialised by WebPConfigInit below.
        let mut config: sys::WebPConfig = unsafe { core::mem::zeroed() };
        // SAFETY: `config` is a valid, exclusively borrowed config.
        if unsafe { sys::WebPConfigInit(&mut config) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::UnknownError,
                "libwebp version mismatch",
            ));
        }
        let mid = settings.qmin.midpoint(settings.qmax);
        config.quality = quality_for_quantizer(mid);
        // Quality bounds run opposite to quantizer bounds.
        config.qmin = quality_for_quantizer(settings.qmax).floor() as c_int;
        config.qmax = quality_for_quantizer(settings.qmin).ceil() as c_int;
        config.method = method_for_speed(settings.speed);
        config.thread_level = c_int::from(settings.threads > 1);
        // Lossless reads `quality` as effort.
        config.lossless = c_int::from(is_lossless(canvas.subsampling));
        // SAFETY: `config` was initialised above.
        if unsafe { sys::WebPValidateConfig(&config) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::InvalidArgument,
                "invalid encoder configuration",
            ));
        }

        // SAFETY: plain data, initialised by WebPAnimEncoderOptionsInit below.
        let mut options: sys::WebPAnimEncoderOptions = unsafe { core::mem::zeroed() };
        // SAFETY: `options` is a valid, exclusively borrowed options struct.
        if unsafe { sys::WebPAnimEncoderOptionsInit(&mut options) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::UnknownError,
                "libwebp version mismatch",
            ));
        }
        options.anim_params.loop_count = c_int::try_from(settings.loop_count).unwrap_or(c_int::MAX);

        // SAFETY: `options` outlives the call; libwebp copies it.
        let enc = NonNull::new(unsafe { sys::WebPAnimEncoderNew(width, height, &options) })
            .ok_or_else(|| {
                CodecFailure::with_detail(CodecStatus::OutOfMemory, "could not create encoder")
            })?;

        tracing::debug!(
            width = canvas.width,
            height = canvas.height,
            quality = config.quality,
            method = config.method,
            lossless = config.lossless,
            "libwebp animation encoder created"
        );

        Ok(Self {
            enc,
            config,
            metadata: settings.metadata.clone(),
            timescale: settings.timescale.max(1),
            timestamp_ms: 0,
            frames: 0,
        })
    }

    /// The encoder's last error message, attached to `status`.
    fn failure(&self, status: CodecStatus) -> CodecFailure {
        // SAFETY: `enc` is live; the returned string is owned by the encoder
        // and valid until the next call on it.
        let message = unsafe { sys::WebPAnimEncoderGetError(self.enc.as_ptr()) };
        if message.is_null() {
            return CodecFailure::new(status);
        }
        // SAFETY: non-null, NUL-terminated, valid for this scope.
        let text = unsafe { CStr::from_ptr(message) }.to_string_lossy();
        if text.is_empty() {
            CodecFailure::new(status)
        } else {
            CodecFailure::with_detail(status, text.to_string())
        }
    }

    fn ticks_to_ms(&self, ticks: u64) -> u64 {
        if self.timescale == TIMESCALE {
            return ticks;
        }
        let ms = (u128::from(ticks) * 1000 + u128::from(self.timescale) / 2) / u128::from(self.timescale);
        u64::try_from(ms).unwrap_or(u64::MAX)
    }
}

impl Drop for WebpAnimEncoder {
    fn drop(&mut self) {
        // SAFETY: created by WebPAnimEncoderNew and deleted only here.
        unsafe { sys::WebPAnimEncoderDelete(self.enc.as_ptr()) };
    }
}

impl SequenceEncoder for WebpAnimEncoder {
    fn new_image(&self, descriptor: &ImageDescriptor) -> Result<Box<dyn CodecImage>, CodecFailure> {
        Ok(Box::new(WebpPicture::new(descriptor)?))
    }

    fn rgb_to_yuv(&self, image: &mut dyn CodecImage, rgb: &RgbImage<'_>) -> Result<(), CodecFailure> {
        picture(image)?.import(rgb)
    }

    fn add_image(
        &mut self,
        image: &mut dyn CodecImage,
        duration: u64,
        flags: AddImageFlags,
    ) -> Result<(), CodecFailure> {
        let timestamp = to_c_int(self.timestamp_ms, "timestamp")?;
        let pic = picture(image)?;
        // SAFETY: `enc` is live, `pic` holds imported pixels and `config` was
        // validated at creation. libwebp copies the frame.
        let ok = unsafe {
            sys::WebPAnimEncoderAdd(self.enc.as_ptr(), &mut pic.pic, timestamp, &self.config)
        };
        if ok == 0 {
            return Err(self.failure(CodecStatus::EncodeFailed));
        }
        self.frames += 1;
        self.timestamp_ms = self.timestamp_ms.saturating_add(self.ticks_to_ms(duration));
        tracing::trace!(
            frame = self.frames,
            timestamp,
            single = flags.single,
            "libwebp frame added"
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CodecFailure> {
        if self.frames == 0 {
            return Err(CodecStatus::NoContent.into());
        }
        let end = to_c_int(self.timestamp_ms, "timestamp")?;
        // SAFETY: a null frame flushes the encoder; the end timestamp sets the
        // last frame's duration.
        if unsafe { sys::WebPAnimEncoderAdd(self.enc.as_ptr(), ptr::null_mut(), end, ptr::null()) } == 0 {
            return Err(self.failure(CodecStatus::EncodeFailed));
        }

        // SAFETY: plain data filled in by WebPAnimEncoderAssemble.
        let mut data: sys::WebPData = unsafe { core::mem::zeroed() };
        // SAFETY: `enc` is live and `data` is exclusively borrowed.
        if unsafe { sys::WebPAnimEncoderAssemble(self.enc.as_ptr(), &mut data) } == 0 {
            return Err(self.failure(CodecStatus::EncodeFailed));
        }
        // SAFETY: on success `data` holds a libwebp allocation we now own.
        let assembled = unsafe { WebpBuffer::from_data(data) };

        if self.metadata.is_empty() {
            return Ok(assembled.to_vec());
        }
        attach_metadata(assembled.as_slice(), &self.metadata)
    }
}

/// Add ICCP, EXIF and XMP chunks to an assembled file.
fn attach_metadata(webp: &[u8], metadata: &Metadata) -> Result<Vec<u8>, CodecFailure> {
    struct Mux(NonNull<sys::WebPMux>);

    impl Drop for Mux {
        fn drop(&mut self) {
            // SAFETY: created by WebPMuxCreate and deleted only here.
            unsafe { sys::WebPMuxDelete(self.0.as_ptr()) };
        }
    }

    let input = webp_data(webp);
    // SAFETY: `input` borrows `webp`; copy_data=1 makes the mux independent of it.
    let mux = NonNull::new(unsafe { sys::WebPMuxCreate(&input, 1) })
        .map(Mux)
        .ok_or_else(|| {
            CodecFailure::with_detail(CodecStatus::BitstreamParseFailed, "could not parse assembled file")
        })?;

    let chunks: [(&[u8; 5], &Option<Vec<u8>>); 3] = [
        (b"ICCP\0", &metadata.icc_profile),
        (b"EXIF\0", &metadata.exif),
        (b"XMP \0", &metadata.xmp),
    ];
    for (fourcc, blob) in chunks {
        let Some(blob) = blob else { continue };
        let chunk = webp_data(blob);
        // SAFETY: `fourcc` is NUL-terminated; copy_data=1 copies `blob`.
        let err = unsafe { sys::WebPMuxSetChunk(mux.0.as_ptr(), fourcc.as_ptr().cast(), &chunk, 1) };
        if err != sys::WEBP_MUX_OK {
            return Err(CodecFailure::with_detail(mux_status(err), "could not attach metadata"));
        }
    }

    // SAFETY: plain data filled in by WebPMuxAssemble.
    let mut out: sys::WebPData = unsafe { core::mem::zeroed() };
    // SAFETY: `mux` is live and `out` is exclusively borrowed.
    let err = unsafe { sys::WebPMuxAssemble(mux.0.as_ptr(), &mut out) };
    // SAFETY: `out` is empty or a libwebp allocation we now own.
    let out = unsafe { WebpBuffer::from_data(out) };
    if err != sys::WEBP_MUX_OK {
        return Err(CodecFailure::with_detail(mux_status(err), "could not assemble file"));
    }
    Ok(out.to_vec())
}

#[cfg(test)]
mod tests {
    use crate::{
        AnimDecoder, AnimEncoder, CodecStatus, DecoderConfig, EncoderConfig, EncoderState,
        ErrorKind, PixelMode, RgbImage, Subsampling, YuvRange,
    };

    const W: u32 = 20;
    const H: u32 = 12;

    fn frames() -> [Vec<u8>; 2] {
        [[180u8, 60, 20].repeat((W * H) as usize), [20u8, 90, 180].repeat((W * H) as usize)]
    }

    fn encode(config: &EncoderConfig) -> Vec<u8> {
        let mut enc = AnimEncoder::new(W, H, config).unwrap();
        for pixels in &frames() {
            enc.add_frame(&RgbImage::new(pixels, W, H, PixelMode::Rgb), 50, false).unwrap();
        }
        enc.finish().unwrap()
    }

    #[test]
    fn metadata_is_attached() {
        let exif = b"Exif\0\0II*\0\x08\0\0\0\0\0".to_vec();
        let xmp = b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>".to_vec();
        let icc = vec![7u8; 64];
        let config = EncoderConfig::new()
            .with_icc_profile(icc.clone())
            .with_exif(exif.clone())
            .with_xmp(xmp.clone());
        let dec = AnimDecoder::new(encode(&config), &DecoderConfig::new()).unwrap();
        let info = dec.info();
        assert_eq!(info.icc_profile(), Some(&icc[..]));
        assert_eq!(info.exif(), Some(&exif[..]));
        assert_eq!(info.xmp(), Some(&xmp[..]));
        assert_eq!(info.frame_count, 2);
    }

    #[test]
    fn no_metadata_reads_back_absent() {
        let dec = AnimDecoder::new(encode(&EncoderConfig::new()), &DecoderConfig::new()).unwrap();
        assert!(dec.info().metadata.is_empty());
    }

    #[test]
    fn invalid_exif_is_value_error() {
        let config = EncoderConfig::new().with_exif(b"invalid".to_vec());
        let err = AnimEncoder::new(W, H, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.status(), Some(CodecStatus::InvalidExifPayload));
    }

    #[test]
    fn loop_count_round_trips() {
        let bytes = encode(&EncoderConfig::new().with_loop_count(3));
        let dec = AnimDecoder::new(bytes, &DecoderConfig::new()).unwrap();
        assert_eq!(dec.info().loop_count, 3);
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    /// Two frames of a horizontal gradient on a `width` x `height` canvas.
    fn encode_sized(width: u32, height: u32, config: &EncoderConfig) -> Vec<u8> {
        let mut enc = AnimEncoder::new(width, height, config).unwrap();
        for shift in [0u32, 60] {
            let pixels: Vec<u8> = (0..width * height)
                .flat_map(|i| {
                    let x = (i % width) * 255 / width.max(2);
                    [(x + shift).min(255) as u8, 100, (255 - x) as u8]
                })
                .collect();
            enc.add_frame(&RgbImage::new(&pixels, width, height, PixelMode::Rgb), 30, false)
                .unwrap();
        }
        enc.finish().unwrap()
    }

    #[test]
    fn every_supported_subsampling_encodes() {
        for subsampling in [Subsampling::Yuv400, Subsampling::Yuv420, Subsampling::Yuv444] {
            let bytes = encode(&EncoderConfig::new().with_subsampling(subsampling).with_speed(10));
            let mut dec = AnimDecoder::new(bytes, &DecoderConfig::new()).unwrap();
            assert_eq!(dec.info().frame_count, 2, "{subsampling}");
            assert!(dec.frame(1).is_ok(), "{subsampling}");
        }
    }

    #[test]
    fn odd_canvases_round_trip() {
        for (width, height) in [(1, 1), (17, 9)] {
            for subsampling in [Subsampling::Yuv400, Subsampling::Yuv420, Subsampling::Yuv444] {
                let config = EncoderConfig::new().with_subsampling(subsampling).with_speed(10);
                let bytes = encode_sized(width, height, &config);
                let mut dec = AnimDecoder::new(bytes, &DecoderConfig::new()).unwrap();
                let info = dec.info().clone();
                assert_eq!((info.width, info.height), (width, height), "{subsampling}");
                assert_eq!(info.frame_count, 2, "{subsampling}");
                for i in 0..2 {
                    let frame = dec.frame(i).unwrap();
                    assert_eq!(
                        frame.pixels.len(),
                        (width * height * info.mode.channels()) as usize,
                        "{width}x{height} {subsampling}"
                    );
                }
            }
        }
    }

    #[test]
    fn wide_chroma_subsampling_is_rejected() {
        let config = EncoderConfig::new().with_subsampling(Subsampling::Yuv422);
        let err = AnimEncoder::new(W, H, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(
            err.to_string(),
            "subsampling 4:2:2 is not supported by libwebp; supported: 4:2:0, 4:0:0, 4:4:4"
        );
    }

    #[test]
    fn lossy_full_range_is_rejected() {
        let config = EncoderConfig::new().with_range(YuvRange::Full);
        let err = AnimEncoder::new(W, H, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(
            err.to_string(),
            "range full is not supported by libwebp with 4:2:0; supported: limited"
        );
        let config = EncoderConfig::new()
            .with_subsampling(Subsampling::Yuv444)
            .with_range(YuvRange::Limited);
        assert_eq!(AnimEncoder::new(W, H, &config).unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn lossy_canvas_is_limited_range_vp8() {
        let enc = AnimEncoder::new(W, H, &EncoderConfig::new()).unwrap();
        assert_eq!(enc.canvas().subsampling, Subsampling::Yuv420);
        assert_eq!(enc.canvas().range, YuvRange::Limited);

        let bytes = encode(&EncoderConfig::new().with_range(YuvRange::Limited));
        assert!(contains(&bytes, b"VP8 "));
        assert!(!contains(&bytes, b"VP8L"));
    }

    #[test]
    fn full_chroma_is_lossless() {
        let config = EncoderConfig::new().with_subsampling(Subsampling::Yuv444);
        let enc = AnimEncoder::new(W, H, &config).unwrap();
        assert_eq!(enc.canvas().range, YuvRange::Full);

        let bytes = encode(&config);
        assert!(contains(&bytes, b"VP8L"));
        assert!(!contains(&bytes, b"VP8 "));
        let mut dec = AnimDecoder::new(bytes, &DecoderConfig::new()).unwrap();
        for (i, expected) in frames().iter().enumerate() {
            let frame = dec.frame(i as u32).unwrap();
            assert_eq!(frame.mode, PixelMode::Rgb);
            assert_eq!(&frame.pixels, expected, "frame {i}");
        }
    }

    #[test]
    fn monochrome_has_neutral_chroma() {
        let bytes = encode(&EncoderConfig::new().with_subsampling(Subsampling::Yuv400));
        let mut dec = AnimDecoder::new(bytes, &DecoderConfig::new()).unwrap();
        let frame = dec.frame(0).unwrap();
        let ch = frame.mode.channels() as usize;
        for px in frame.pixels.chunks_exact(ch) {
            assert!(px[0].abs_diff(px[1]) <= 8 && px[1].abs_diff(px[2]) <= 8, "{px:?}");
        }
    }

    #[test]
    fn mismatched_frame_leaves_session_usable() {
        let [a, b] = frames();
        let mut enc = AnimEncoder::new(W, H, &EncoderConfig::new()).unwrap();
        enc.add_frame(&RgbImage::new(&a, W, H, PixelMode::Rgb), 40, false).unwrap();

        let small = vec![0u8; 4 * 4 * 3];
        let err = enc
            .add_frame(&RgbImage::new(&small, 4, 4, PixelMode::Rgb), 40, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(enc.state(), EncoderState::Adding);

        enc.add_frame(&RgbImage::new(&b, W, H, PixelMode::Rgb), 40, false).unwrap();
        let dec = AnimDecoder::new(enc.finish().unwrap(), &DecoderConfig::new()).unwrap();
        assert_eq!(dec.info().frame_count, 2);
    }

    #[test]
    fn finish_twice_is_state_error() {
        let [a, _] = frames();
        let mut enc = AnimEncoder::new(W, H, &EncoderConfig::new()).unwrap();
        let err = enc.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(enc.state(), EncoderState::Created);

        enc.add_frame(&RgbImage::new(&a, W, H, PixelMode::Rgb), 40, false).unwrap();
        enc.finish().unwrap();
        assert_eq!(enc.finish().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            enc.add_frame(&RgbImage::new(&a, W, H, PixelMode::Rgb), 40, false)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidState
        );
        enc.dispose();
        enc.dispose();
        assert_eq!(enc.state(), EncoderState::Disposed);
    }
}
