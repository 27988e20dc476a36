//! In-memory codec for exercising sessions without a native library.
//!
//! Container layout: `MOCK`, then width, height and frame count as
//! little-endian `u32`, then one alpha flag byte. Every frame lasts
//! [`FRAME_TICKS`] ticks and is filled with its index.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::ops::RangeInclusive;

use super::{
    AddImageFlags, AnimCodec, Capabilities, CodecImage, ContainerInfo, DecoderSettings,
    EncoderSettings, FrameTiming, SequenceDecoder, SequenceEncoder,
};
use crate::config::{ImageDescriptor, Subsampling, Upsampling, YuvRange};
use crate::pixel::{PixelMode, RgbImage};
use crate::{CodecFailure, CodecStatus, Metadata};

pub(crate) const FRAME_TICKS: u64 = 100;
const MAGIC: &[u8] = b"MOCK";
const HEADER_LEN: usize = 17;

#[derive(Debug)]
pub(crate) struct MockCodec;

impl AnimCodec for MockCodec {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn version(&self) -> String {
        "1.0.0".into()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            encode: true,
            decode: true,
        }
    }

    fn quantizer_range(&self) -> RangeInclusive<u8> {
        0..=63
    }

    fn speed_range(&self) -> RangeInclusive<u8> {
        0..=10
    }

    fn new_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn SequenceEncoder>, CodecFailure> {
        if let Some(exif) = &settings.metadata.exif {
            super::check_exif(exif)?;
        }
        Ok(Box::new(MockEncoder {
            settings: settings.clone(),
            durations: Vec::new(),
            alpha: false,
        }))
    }

    fn new_decoder(
        &self,
        data: Arc<[u8]>,
        _settings: &DecoderSettings,
    ) -> Result<Box<dyn SequenceDecoder>, CodecFailure> {
        if !MAGIC.starts_with(&data[..data.len().min(4)]) {
            return Err(CodecStatus::InvalidSignature.into());
        }
        if data.len() < HEADER_LEN {
            return Err(CodecStatus::TruncatedData.into());
        }
        let field = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let info = ContainerInfo {
            width: field(4),
            height: field(8),
            frame_count: field(12),
            has_alpha: data[16] != 0,
            loop_count: 0,
            metadata: Metadata::none(),
        };
        if info.frame_count == 0 {
            return Err(CodecStatus::NoContent.into());
        }
        Ok(Box::new(MockDecoder { info, current: None }))
    }
}

/// [`MockCodec`] restricted to a few formats and one upsampling filter.
#[derive(Debug)]
pub(crate) struct NarrowCodec;

impl AnimCodec for NarrowCodec {
    fn name(&self) -> &'static str {
        "narrow"
    }

    fn version(&self) -> String {
        MockCodec.version()
    }

    fn capabilities(&self) -> Capabilities {
        MockCodec.capabilities()
    }

    fn quantizer_range(&self) -> RangeInclusive<u8> {
        MockCodec.quantizer_range()
    }

    fn speed_range(&self) -> RangeInclusive<u8> {
        MockCodec.speed_range()
    }

    fn encodable_formats(&self) -> &'static [(Subsampling, YuvRange)] {
        &[
            (Subsampling::Yuv420, YuvRange::Limited),
            (Subsampling::Yuv444, YuvRange::Full),
        ]
    }

    fn upsamplings(&self) -> &'static [Upsampling] {
        &[Upsampling::Automatic, Upsampling::Bilinear]
    }

    fn new_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn SequenceEncoder>, CodecFailure> {
        MockCodec.new_encoder(settings)
    }

    fn new_decoder(
        &self,
        data: Arc<[u8]>,
        settings: &DecoderSettings,
    ) -> Result<Box<dyn SequenceDecoder>, CodecFailure> {
        MockCodec.new_decoder(data, settings)
    }
}

pub(crate) fn container(width: u32, height: u32, frames: u32, alpha: bool) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&frames.to_le_bytes());
    out.push(u8::from(alpha));
    out
}

struct MockImage {
    descriptor: ImageDescriptor,
    alpha: Option<bool>,
}

impl CodecImage for MockImage {
    fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct MockEncoder {
    settings: EncoderSettings,
    durations: Vec<u64>,
    alpha: bool,
}

impl SequenceEncoder for MockEncoder {
    fn new_image(&self, descriptor: &ImageDescriptor) -> Result<Box<dyn CodecImage>, CodecFailure> {
        Ok(Box::new(MockImage {
            descriptor: *descriptor,
            alpha: None,
        }))
    }

    fn rgb_to_yuv(&self, image: &mut dyn CodecImage, rgb: &RgbImage<'_>) -> Result<(), CodecFailure> {
        let image = image
            .as_any_mut()
            .downcast_mut::<MockImage>()
            .ok_or(CodecStatus::IncompatibleImage)?;
        image.alpha = Some(rgb.mode == PixelMode::Rgba);
        Ok(())
    }

    fn add_image(
        &mut self,
        image: &mut dyn CodecImage,
        duration: u64,
        _flags: AddImageFlags,
    ) -> Result<(), CodecFailure> {
        let image = image
            .as_any_mut()
            .downcast_mut::<MockImage>()
            .ok_or(CodecStatus::IncompatibleImage)?;
        let alpha = image.alpha.ok_or(CodecStatus::EncodeFailed)?;
        self.alpha |= alpha;
        self.durations.push(duration);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CodecFailure> {
        if self.durations.is_empty() {
            return Err(CodecStatus::NoContent.into());
        }
        let canvas = &self.settings.canvas;
        Ok(container(
            canvas.width,
            canvas.height,
            self.durations.len() as u32,
            self.alpha,
        ))
    }
}

struct MockDecoder {
    info: ContainerInfo,
    current: Option<u32>,
}

impl SequenceDecoder for MockDecoder {
    fn container(&self) -> &ContainerInfo {
        &self.info
    }

    fn nth_image(&mut self, index: u32) -> Result<FrameTiming, CodecFailure> {
        if index >= self.info.frame_count {
            return Err(CodecStatus::NoImagesRemaining.into());
        }
        self.current = Some(index);
        Ok(FrameTiming {
            timescale: crate::TIMESCALE,
            pts: u64::from(index) * FRAME_TICKS,
            duration: FRAME_TICKS,
        })
    }

    fn yuv_to_rgb(&mut self, _mode: PixelMode, out: &mut [u8]) -> Result<(), CodecFailure> {
        let index = self.current.ok_or(CodecStatus::DecodeFailed)?;
        out.fill(index as u8);
        Ok(())
    }
}
