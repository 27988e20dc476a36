//! Animated WebP decoding through `WebPAnimDecoder`.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ffi::c_int;
use core::ptr::{self, NonNull};

use libwebp_sys2 as sys;

use super::webp::{TIMESCALE, check_signature, vp8_status, webp_data};
use super::{ContainerInfo, DecoderSettings, FrameTiming, SequenceDecoder};
use crate::limits::non_empty;
use crate::pixel::PixelMode;
use crate::{CodecFailure, CodecStatus, Metadata};

/// Owned `WebPAnimDecoder` over a shared input buffer.
pub(crate) struct WebpAnimDecoder {
    dec: NonNull<sys::WebPAnimDecoder>,
    info: ContainerInfo,
    /// RGBA canvas of the current frame.
    canvas: Vec<u8>,
    /// Index `WebPAnimDecoderGetNext` will return next.
    next_index: u32,
    /// End timestamp of the last frame returned, in milliseconds.
    end_ms: c_int,
    /// Referenced by `dec`; must outlive it.
    _data: Arc<[u8]>,
}

// SAFETY: the decoder handle is exclusively owned, the input it references is
// immutable and kept alive by `_data`, and every call goes through `&mut self`.
unsafe impl Send for WebpAnimDecoder {}

impl WebpAnimDecoder {
    pub(crate) fn new(data: Arc<[u8]>, settings: &DecoderSettings) -> Result<Self, CodecFailure> {
        check_signature(&data)?;

        // SAFETY: plain data filled in by WebPGetFeatures.
        let mut features: sys::WebPBitstreamFeatures = unsafe { core::mem::zeroed() };
        // SAFETY: `data` is valid for `data.len()` bytes.
        let status = unsafe { sys::WebPGetFeatures(data.as_ptr(), data.len(), &mut features) };
        if status != sys::VP8_STATUS_OK {
            return Err(CodecFailure::with_detail(vp8_status(status), "could not read bitstream features"));
        }

        let input = webp_data(&data);
        check_complete(&input)?;

        // SAFETY: plain data, initialised by WebPAnimDecoderOptionsInit below.
        let mut options: sys::WebPAnimDecoderOptions = unsafe { core::mem::zeroed() };
        // SAFETY: `options` is a valid, exclusively borrowed options struct.
        if unsafe { sys::WebPAnimDecoderOptionsInit(&mut options) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::UnknownError,
                "libwebp version mismatch",
            ));
        }
        options.color_mode = sys::MODE_RGBA;
        options.use_threads = c_int::from(settings.threads > 1);

        // SAFETY: `input` points into `data`, which the decoder keeps alive.
        let dec = NonNull::new(unsafe { sys::WebPAnimDecoderNew(&input, &options) }).ok_or_else(|| {
            CodecFailure::with_detail(CodecStatus::BitstreamParseFailed, "could not create decoder")
        })?;
        // From here on `Drop` releases the handle on every exit path.
        let mut decoder = Self {
            dec,
            info: ContainerInfo {
                width: 0,
                height: 0,
                frame_count: 0,
                has_alpha: false,
                loop_count: 0,
                metadata: Metadata::none(),
            },
            canvas: Vec::new(),
            next_index: 0,
            end_ms: 0,
            _data: data,
        };

        // SAFETY: plain data filled in by WebPAnimDecoderGetInfo.
        let mut anim: sys::WebPAnimInfo = unsafe { core::mem::zeroed() };
        // SAFETY: `dec` is live and `anim` is exclusively borrowed.
        if unsafe { sys::WebPAnimDecoderGetInfo(decoder.dec.as_ptr(), &mut anim) } == 0 {
            return Err(CodecFailure::with_detail(
                CodecStatus::BitstreamParseFailed,
                "could not read animation info",
            ));
        }
        decoder.info.width = anim.canvas_width;
        decoder.info.height = anim.canvas_height;
        decoder.info.frame_count = anim.frame_count;
        decoder.info.loop_count = anim.loop_count;
        decoder.info.metadata = decoder.read_metadata();
        decoder.info.has_alpha = features.has_alpha != 0 || decoder.canvas_has_alpha();

        tracing::debug!(
            width = anim.canvas_width,
            height = anim.canvas_height,
            frames = anim.frame_count,
            has_alpha = decoder.info.has_alpha,
            "libwebp container parsed"
        );
        Ok(decoder)
    }

    fn read_metadata(&self) -> Metadata {
        // SAFETY: `dec` is live; the demuxer is owned by it.
        let demux = unsafe { sys::WebPAnimDecoderGetDemuxer(self.dec.as_ptr()) };
        if demux.is_null() {
            return Metadata::none();
        }
        Metadata {
            icc_profile: chunk(demux, b"ICCP\0"),
            exif: chunk(demux, b"EXIF\0"),
            xmp: chunk(demux, b"XMP \0"),
        }
    }

    /// Whether any composited canvas can hold a transparent pixel.
    ///
    /// The VP8X alpha flag is not enough: frames carry their own alpha, and
    /// canvas area left uncovered, or cleared by background disposal, stays
    /// transparent.
    fn canvas_has_alpha(&self) -> bool {
        // SAFETY: `dec` is live; the demuxer is owned by it.
        let demux = unsafe { sys::WebPAnimDecoderGetDemuxer(self.dec.as_ptr()) };
        if demux.is_null() {
            return false;
        }
        // SAFETY: `demux` is live.
        let flags = unsafe { sys::WebPDemuxGetI(demux, sys::WEBP_FF_FORMAT_FLAGS) };
        if flags & sys::ALPHA_FLAG != 0 {
            return true;
        }

        // SAFETY: plain data filled in by WebPDemuxGetFrame.
        let mut iter: sys::WebPIterator = unsafe { core::mem::zeroed() };
        // SAFETY: `demux` is live and `iter` is exclusively borrowed.
        if unsafe { sys::WebPDemuxGetFrame(demux, 1, &mut iter) } == 0 {
            return false;
        }
        // Transparent area the next frame must paint over. The canvas starts
        // out fully transparent.
        let mut exposed = Some(FrameRect::canvas(self.info.width, self.info.height));
        let mut alpha = false;
        loop {
            let frame = FrameRect::from_iter(&iter);
            if iter.has_alpha != 0 || exposed.is_some_and(|e| !frame.covers(&e)) {
                alpha = true;
                break;
            }
            exposed = (iter.dispose_method == sys::WEBP_MUX_DISPOSE_BACKGROUND).then_some(frame);
            // SAFETY: `iter` was filled in by WebPDemuxGetFrame.
            if unsafe { sys::WebPDemuxNextFrame(&mut iter) } == 0 {
                break;
            }
        }
        // SAFETY: `iter` was filled in by WebPDemuxGetFrame.
        unsafe { sys::WebPDemuxReleaseIterator(&mut iter) };
        alpha
    }

    fn rewind(&mut self) {
        // SAFETY: `dec` is live.
        unsafe { sys::WebPAnimDecoderReset(self.dec.as_ptr()) };
        self.next_index = 0;
        self.end_ms = 0;
    }
}

impl Drop for WebpAnimDecoder {
    fn drop(&mut self) {
        // SAFETY: created by WebPAnimDecoderNew and deleted only here.
        unsafe { sys::WebPAnimDecoderDelete(self.dec.as_ptr()) };
    }
}

impl SequenceDecoder for WebpAnimDecoder {
    fn container(&self) -> &ContainerInfo {
        &self.info
    }

    fn nth_image(&mut self, index: u32) -> Result<FrameTiming, CodecFailure> {
        if index >= self.info.frame_count {
            return Err(CodecStatus::NoImagesRemaining.into());
        }
        if index < self.next_index {
            self.rewind();
        }

        let canvas_len = self.info.width as usize * self.info.height as usize * 4;
        let mut start_ms = self.end_ms;
        while self.next_index <= index {
            let mut buf: *mut u8 = ptr::null_mut();
            let mut timestamp: c_int = 0;
            // SAFETY: `dec` is live; on success `buf` points to the decoder's
            // RGBA canvas, valid until the next call on `dec`.
            let ok = unsafe { sys::WebPAnimDecoderGetNext(self.dec.as_ptr(), &mut buf, &mut timestamp) };
            if ok == 0 || buf.is_null() {
                // Leave the decoder in a state the next call rewinds from.
                self.next_index = u32::MAX;
                self.canvas.clear();
                return Err(CodecStatus::DecodeFailed.into());
            }
            start_ms = self.end_ms;
            self.end_ms = timestamp;
            self.next_index += 1;
            if self.next_index > index {
                // SAFETY: the canvas is `width * height * 4` bytes.
                let frame = unsafe { core::slice::from_raw_parts(buf, canvas_len) };
                self.canvas.clear();
                self.canvas.extend_from_slice(frame);
            }
        }

        let pts = u64::try_from(start_ms).unwrap_or(0);
        let end = u64::try_from(self.end_ms).unwrap_or(0);
        tracing::trace!(index, pts, end, "libwebp frame decoded");
        Ok(FrameTiming {
            timescale: TIMESCALE,
            pts,
            duration: end.saturating_sub(pts),
        })
    }

    fn yuv_to_rgb(&mut self, mode: PixelMode, out: &mut [u8]) -> Result<(), CodecFailure> {
        let pixels = self.info.width as usize * self.info.height as usize;
        if self.canvas.len() != pixels * 4 {
            return Err(CodecFailure::with_detail(CodecStatus::DecodeFailed, "no decoded frame"));
        }
        if out.len() != pixels * mode.channels() as usize {
            return Err(CodecFailure::with_detail(
                CodecStatus::InvalidArgument,
                "output buffer has the wrong size",
            ));
        }
        match mode {
            PixelMode::Rgba => out.copy_from_slice(&self.canvas),
            PixelMode::Rgb => {
                for (dst, src) in out.chunks_exact_mut(3).zip(self.canvas.chunks_exact(4)) {
                    dst.copy_from_slice(&src[..3]);
                }
            }
        }
        Ok(())
    }
}

/// A rectangle on the canvas, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrameRect {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

impl FrameRect {
    fn canvas(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: i64::from(width),
            height: i64::from(height),
        }
    }

    fn from_iter(iter: &sys::WebPIterator) -> Self {
        Self {
            x: i64::from(iter.x_offset),
            y: i64::from(iter.y_offset),
            width: i64::from(iter.width),
            height: i64::from(iter.height),
        }
    }

    /// Whether every pixel of `other` lies inside `self`.
    fn covers(&self, other: &FrameRect) -> bool {
        other.width <= 0
            || other.height <= 0
            || (self.x <= other.x
                && self.y <= other.y
                && self.x + self.width >= other.x + other.width
                && self.y + self.height >= other.y + other.height)
    }
}

/// Demux the whole input, failing on truncated or malformed containers.
fn check_complete(input: &sys::WebPData) -> Result<(), CodecFailure> {
    let mut state = sys::WEBP_DEMUX_PARSING_HEADER;
    // SAFETY: `input` borrows live bytes for the duration of the call; the
    // demuxer is deleted before returning.
    let demux = unsafe { sys::WebPDemuxPartial(input, &mut state) };
    if !demux.is_null() {
        // SAFETY: created just above and not used afterwards.
        unsafe { sys::WebPDemuxDelete(demux) };
    }
    match state {
        sys::WEBP_DEMUX_DONE if !demux.is_null() => Ok(()),
        sys::WEBP_DEMUX_PARSE_ERROR | sys::WEBP_DEMUX_DONE => Err(
            CodecFailure::with_detail(CodecStatus::BitstreamParseFailed, "could not parse container"),
        ),
        _ => Err(CodecFailure::with_detail(CodecStatus::TruncatedData, "container is incomplete")),
    }
}

/// Copy the first chunk with the given NUL-terminated fourcc.
fn chunk(demux: *const sys::WebPDemuxer, fourcc: &[u8; 5]) -> Option<Vec<u8>> {
    // SAFETY: plain data filled in by WebPDemuxGetChunk.
    let mut iter: sys::WebPChunkIterator = unsafe { core::mem::zeroed() };
    // SAFETY: `demux` is live and `fourcc` is NUL-terminated.
    if unsafe { sys::WebPDemuxGetChunk(demux, fourcc.as_ptr().cast(), 1, &mut iter) } == 0 {
        return None;
    }
    let bytes = if iter.chunk.bytes.is_null() {
        Vec::new()
    } else {
        // SAFETY: the iterator points at `size` bytes inside the demuxed input.
        unsafe { core::slice::from_raw_parts(iter.chunk.bytes, iter.chunk.size) }.to_vec()
    };
    // SAFETY: `iter` was filled in by WebPDemuxGetChunk.
    unsafe { sys::WebPDemuxReleaseChunkIterator(&mut iter) };
    non_empty(bytes)
}
