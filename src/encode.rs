//! Animation encoding sessions.

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::codecs::{AddImageFlags, AnimCodec, CodecImage, EncoderSettings, SequenceEncoder};
use crate::config::{Cicp, EncoderConfig, ImageDescriptor, Subsampling, YuvRange};
use crate::pixel::RgbImage;
use crate::{CodecError, CodecRegistry, CodecStatus};

/// Ticks per second of encoder frame durations (milliseconds).
pub const TIMESCALE: u64 = 1000;

/// Lifecycle of an [`AnimEncoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncoderState {
    /// No frame added yet.
    Created,
    /// At least one frame added.
    Adding,
    /// Bitstream emitted; only disposal remains.
    Finished,
    /// Codec resources released.
    Disposed,
}

impl EncoderState {
    /// Lower-case state name.
    pub fn as_str(self) -> &'static str {
        match self {
            EncoderState::Created => "created",
            EncoderState::Adding => "adding",
            EncoderState::Finished => "finished",
            EncoderState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-frame encoder session.
///
/// `created -> adding* -> finished -> disposed`. Calls made out of order fail
/// with [`CodecError::InvalidState`].
///
/// # Example
///
/// ```no_run
/// use zenframes::{AnimEncoder, EncoderConfig, PixelMode, RgbImage};
///
/// let config = EncoderConfig::new().with_quality(80);
/// let mut encoder = AnimEncoder::new(64, 48, &config)?;
/// let red = vec![255u8, 0, 0].repeat(64 * 48);
/// let blue = vec![0u8, 0, 255].repeat(64 * 48);
/// encoder.add_frame(&RgbImage::new(&red, 64, 48, PixelMode::Rgb), 100, false)?;
/// encoder.add_frame(&RgbImage::new(&blue, 64, 48, PixelMode::Rgb), 100, false)?;
/// let bytes = encoder.finish()?;
/// # Ok::<(), zenframes::CodecError>(())
/// ```
pub struct AnimEncoder {
    state: EncoderState,
    codec: Arc<dyn AnimCodec>,
    encoder: Option<Box<dyn SequenceEncoder>>,
    /// Allocated at creation and consumed by the first frame.
    canvas: Option<Box<dyn CodecImage>>,
    descriptor: ImageDescriptor,
    frames: u32,
    single: bool,
}

impl fmt::Debug for AnimEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimEncoder")
            .field("codec", &self.codec.name())
            .field("state", &self.state)
            .field("descriptor", &self.descriptor)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl AnimEncoder {
    /// Create a session with every compiled-in codec available.
    pub fn new(width: u32, height: u32, config: &EncoderConfig) -> Result<Self, CodecError> {
        Self::with_registry(width, height, config, &CodecRegistry::all())
    }

    /// Create a session choosing the codec from `registry`.
    pub fn with_registry(
        width: u32,
        height: u32,
        config: &EncoderConfig,
        registry: &CodecRegistry,
    ) -> Result<Self, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::Value(format!(
                "invalid canvas dimensions: {width}x{height}"
            )));
        }
        let codec = registry.resolve_encoder(&config.codec)?;

        let quantizers = codec.quantizer_range();
        let qmax = clamp_to(config.qmax, &quantizers);
        let qmin = clamp_to(config.qmin, &quantizers).min(qmax);
        let speed = clamp_to(config.speed, &codec.speed_range());
        let range = resolve_range(codec.as_ref(), config.subsampling, config.range)?;

        let descriptor = ImageDescriptor {
            width,
            height,
            depth: 8,
            subsampling: config.subsampling,
            range,
            cicp: Cicp::for_profile(config.metadata.icc_profile.is_some()),
        };
        let settings = EncoderSettings {
            canvas: descriptor,
            qmin,
            qmax,
            speed,
            threads: crate::threads::max_threads(),
            timescale: TIMESCALE,
            loop_count: config.loop_count,
            metadata: config.metadata.clone(),
        };

        let encoder = codec
            .new_encoder(&settings)
            .map_err(|e| CodecError::from_codec("Failed to create encoder", e))?;
        let canvas = encoder
            .new_image(&descriptor)
            .map_err(|e| CodecError::from_codec("Failed to create image", e))?;

        tracing::debug!(
            codec = codec.name(),
            width,
            height,
            subsampling = %config.subsampling,
            range = %range,
            qmin,
            qmax,
            speed,
            threads = settings.threads,
            "encoder session created"
        );

        Ok(Self {
            state: EncoderState::Created,
            codec,
            encoder: Some(encoder),
            canvas: Some(canvas),
            descriptor,
            frames: 0,
            single: false,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Name of the codec this session encodes with.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Canvas format shared by every frame.
    pub fn canvas(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Frames added so far.
    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    /// Append a frame lasting `duration` milliseconds.
    ///
    /// `single` declares this the only frame of the sequence; no frame may
    /// follow it. A frame whose size differs from the canvas is rejected and
    /// the session stays usable.
    pub fn add_frame(&mut self, image: &RgbImage<'_>, duration: u64, single: bool) -> Result<(), CodecError> {
        match self.state {
            EncoderState::Created | EncoderState::Adding if !self.single => {}
            EncoderState::Created | EncoderState::Adding => {
                return Err(CodecError::InvalidState {
                    operation: "add a frame after a single-frame add",
                    state: self.state.as_str(),
                });
            }
            EncoderState::Finished | EncoderState::Disposed => {
                return Err(CodecError::InvalidState {
                    operation: "add a frame",
                    state: self.state.as_str(),
                });
            }
        }

        let canvas = &self.descriptor;
        if image.width != canvas.width || image.height != canvas.height {
            return Err(CodecError::Value(format!(
                "Image sequence dimensions mismatch, {}x{} != {}x{}",
                canvas.width, canvas.height, image.width, image.height
            )));
        }
        let expected = image
            .expected_len()
            .ok_or_else(|| CodecError::Memory("Integer overflow in pixel size".into()))?;
        if image.pixels.len() != expected {
            return Err(CodecError::Runtime(format!(
                "rgb data is incorrect size: {} != {expected}",
                image.pixels.len()
            )));
        }

        let (Some(encoder), canvas) = (self.encoder.as_mut(), &mut self.canvas) else {
            return Err(CodecError::InvalidState {
                operation: "add a frame",
                state: self.state.as_str(),
            });
        };
        // The first frame is converted into the canvas image itself; later
        // frames get a transient image released when this call returns.
        let mut transient;
        let frame: &mut dyn CodecImage = match canvas.as_deref_mut() {
            Some(canvas) if self.frames == 0 => canvas,
            _ => {
                transient = encoder
                    .new_image(&self.descriptor)
                    .map_err(|e| CodecError::from_codec("Failed to create image", e))?;
                transient.as_mut()
            }
        };

        encoder
            .rgb_to_yuv(frame, image)
            .map_err(|e| CodecError::from_codec("Conversion to YUV failed", e))?;
        encoder
            .add_image(frame, duration, AddImageFlags { single })
            .map_err(|e| CodecError::from_codec("Failed to encode image", e))?;

        self.frames += 1;
        self.single = single;
        self.state = EncoderState::Adding;
        tracing::trace!(frame = self.frames, duration, single, mode = %image.mode, "frame added");
        Ok(())
    }

    /// Emit the complete bitstream. Succeeds at most once.
    pub fn finish(&mut self) -> Result<Vec<u8>, CodecError> {
        let encoder = match (self.state, self.encoder.as_mut()) {
            (EncoderState::Created | EncoderState::Adding, Some(encoder)) => encoder,
            _ => {
                return Err(CodecError::InvalidState {
                    operation: "finish",
                    state: self.state.as_str(),
                });
            }
        };
        if self.frames == 0 {
            return Err(CodecError::from_codec(
                "Failed to finish encoding",
                CodecStatus::NoContent,
            ));
        }
        let bytes = encoder
            .finish()
            .map_err(|e| CodecError::from_codec("Failed to finish encoding", e))?;
        self.state = EncoderState::Finished;
        tracing::debug!(
            codec = self.codec.name(),
            frames = self.frames,
            bytes = bytes.len(),
            "encoder session finished"
        );
        Ok(bytes)
    }

    /// Release the codec handle and canvas image. Idempotent.
    pub fn dispose(&mut self) {
        self.encoder = None;
        self.canvas = None;
        self.state = EncoderState::Disposed;
    }
}

/// The range to encode `subsampling` with, or a value error naming what the
/// codec supports.
fn resolve_range(
    codec: &dyn AnimCodec,
    subsampling: Subsampling,
    requested: Option<YuvRange>,
) -> Result<YuvRange, CodecError> {
    let formats = codec.encodable_formats();
    let ranges: Vec<YuvRange> = formats
        .iter()
        .filter(|(s, _)| *s == subsampling)
        .map(|&(_, r)| r)
        .collect();
    let Some(&native) = ranges.first() else {
        let mut supported: Vec<&str> = Vec::new();
        for (s, _) in formats {
            if !supported.contains(&s.as_str()) {
                supported.push(s.as_str());
            }
        }
        return Err(CodecError::Value(format!(
            "subsampling {subsampling} is not supported by {}; supported: {}",
            codec.name(),
            supported.join(", ")
        )));
    };
    match requested {
        None => Ok(native),
        Some(range) if ranges.contains(&range) => Ok(range),
        Some(range) => {
            let supported: Vec<&str> = ranges.iter().map(|r| r.as_str()).collect();
            Err(CodecError::Value(format!(
                "range {range} is not supported by {} with {subsampling}; supported: {}",
                codec.name(),
                supported.join(", ")
            )))
        }
    }
}

fn clamp_to(value: i32, range: &core::ops::RangeInclusive<u8>) -> u8 {
    let clamped = value.clamp(i32::from(*range.start()), i32::from(*range.end()));
    u8::try_from(clamped).unwrap_or(*range.end())
}
