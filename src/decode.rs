//! Animation decoding sessions.

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::codecs::{AnimCodec, DecoderSettings, SequenceDecoder};
use crate::config::DecoderConfig;
use crate::pixel::{Frame, PixelMode};
use crate::{CodecError, CodecRegistry, Limits, Metadata};

/// Container facts, read once when the session is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Number of frames.
    pub frame_count: u32,
    /// Layout every frame is decoded to: RGBA when the container has alpha.
    pub mode: PixelMode,
    /// Animation loop count, 0 loops forever.
    pub loop_count: u32,
    /// ICC, EXIF and XMP boxes.
    pub metadata: Metadata,
}

impl ImageInfo {
    /// More than one frame.
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    /// ICC profile, if present.
    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.metadata.icc_profile.as_deref()
    }

    /// EXIF payload, if present.
    pub fn exif(&self) -> Option<&[u8]> {
        self.metadata.exif.as_deref()
    }

    /// XMP packet, if present.
    pub fn xmp(&self) -> Option<&[u8]> {
        self.metadata.xmp.as_deref()
    }
}

/// Random-access decoder session over a complete encoded buffer.
///
/// The buffer is shared with the codec for the session's lifetime. Each call
/// to [`frame`](Self::frame) decodes from the container again; nothing is
/// cached between calls.
///
/// ```no_run
/// use zenframes::{AnimDecoder, DecoderConfig};
///
/// let bytes = std::fs::read("anim.webp")?;
/// let mut decoder = AnimDecoder::new(bytes, &DecoderConfig::new())?;
/// for i in 0..decoder.info().frame_count {
///     let frame = decoder.frame(i)?;
///     println!("frame {i}: {} ms", frame.duration_ms());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AnimDecoder {
    codec: Arc<dyn AnimCodec>,
    decoder: Box<dyn SequenceDecoder>,
    info: ImageInfo,
    limits: Limits,
}

impl fmt::Debug for AnimDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimDecoder")
            .field("codec", &self.codec.name())
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AnimDecoder {
    /// Parse `data` with every compiled-in codec available.
    pub fn new(data: impl Into<Arc<[u8]>>, config: &DecoderConfig) -> Result<Self, CodecError> {
        Self::with_registry(data, config, &CodecRegistry::all())
    }

    /// Parse `data` choosing the codec from `registry`.
    ///
    /// Fails without returning a session if the container cannot be parsed or
    /// its canvas exceeds `config.limits`.
    pub fn with_registry(
        data: impl Into<Arc<[u8]>>,
        config: &DecoderConfig,
        registry: &CodecRegistry,
    ) -> Result<Self, CodecError> {
        let codec = registry.resolve_decoder(&config.codec)?;
        let upsamplings = codec.upsamplings();
        if !upsamplings.contains(&config.upsampling) {
            let supported: Vec<&str> = upsamplings.iter().map(|u| u.as_str()).collect();
            return Err(CodecError::Value(format!(
                "upsampling {} is not supported by {}; supported: {}",
                config.upsampling,
                codec.name(),
                supported.join(", ")
            )));
        }
        let settings = DecoderSettings {
            upsampling: config.upsampling,
            threads: crate::threads::max_threads(),
        };
        let decoder = codec
            .new_decoder(data.into(), &settings)
            .map_err(|e| CodecError::from_codec("Failed to decode image", e))?;

        let container = decoder.container();
        let mode = PixelMode::from_alpha(container.has_alpha);
        config
            .limits
            .check_dimensions(u64::from(container.width), u64::from(container.height))
            .map_err(|e| {
                CodecError::Memory(format!("{e}: {}x{}", container.width, container.height))
            })?;
        let info = ImageInfo {
            width: container.width,
            height: container.height,
            frame_count: container.frame_count,
            mode,
            loop_count: container.loop_count,
            metadata: container.metadata.clone(),
        };

        tracing::debug!(
            codec = codec.name(),
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            mode = %info.mode,
            "decoder session created"
        );

        Ok(Self {
            codec,
            decoder,
            info,
            limits: config.limits.clone(),
        })
    }

    /// Container facts. No codec work is done.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Name of the codec this session decodes with.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Decode frame `index` to interleaved pixels in [`ImageInfo::mode`].
    ///
    /// Indices at or past [`ImageInfo::frame_count`] fail with a runtime error.
    pub fn frame(&mut self, index: u32) -> Result<Frame, CodecError> {
        let context = || format!("Failed to decode frame {index}");
        let (width, height, mode) = (self.info.width, self.info.height, self.info.mode);
        let len = self.limits.validate(width, height, mode.channels())?;

        let timing = self
            .decoder
            .nth_image(index)
            .map_err(|e| CodecError::from_codec(context(), e))?;

        let mut pixels = vec![0u8; len];
        self.decoder
            .yuv_to_rgb(mode, &mut pixels)
            .map_err(|e| CodecError::from_codec("Conversion from YUV failed", e))?;

        tracing::trace!(index, pts = timing.pts, duration = timing.duration, "frame decoded");
        Ok(Frame {
            pixels,
            width,
            height,
            mode,
            timescale: timing.timescale,
            pts: timing.pts,
            duration: timing.duration,
        })
    }
}
