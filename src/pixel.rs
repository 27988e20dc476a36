//! Interleaved 8-bit pixel buffers.
//!
//! Input frames are borrowed byte slices described by [`RgbImage`]; decoded
//! frames are owned by [`Frame`]. Typed views use `imgref` over `rgb` pixels.

use alloc::format;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{Rgb, Rgba};

use crate::CodecError;

/// Channel layout of an interleaved 8-bit buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelMode {
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl PixelMode {
    /// Mode for a container with or without an alpha channel.
    pub fn from_alpha(has_alpha: bool) -> Self {
        if has_alpha {
            PixelMode::Rgba
        } else {
            PixelMode::Rgb
        }
    }

    /// Bytes per pixel.
    pub fn channels(self) -> u32 {
        match self {
            PixelMode::Rgb => 3,
            PixelMode::Rgba => 4,
        }
    }

    /// Whether the layout carries alpha.
    pub fn has_alpha(self) -> bool {
        self == PixelMode::Rgba
    }

    /// Host-facing mode name.
    pub fn as_str(self) -> &'static str {
        match self {
            PixelMode::Rgb => "RGB",
            PixelMode::Rgba => "RGBA",
        }
    }
}

impl fmt::Display for PixelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelMode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RGB" => Ok(PixelMode::Rgb),
            "RGBA" => Ok(PixelMode::Rgba),
            _ => Err(CodecError::Value(format!("Invalid pixel mode: {s}"))),
        }
    }
}

/// Borrowed interleaved pixels handed to an encoder.
///
/// Rows are tightly packed: `row_bytes() == width * channels`.
#[derive(Clone, Copy, Debug)]
pub struct RgbImage<'a> {
    /// Pixel bytes, `row_bytes() * height` long.
    pub pixels: &'a [u8],
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout.
    pub mode: PixelMode,
}

impl<'a> RgbImage<'a> {
    /// Describe a packed buffer. Sizes are checked by the consumer.
    pub fn new(pixels: &'a [u8], width: u32, height: u32, mode: PixelMode) -> Self {
        Self {
            pixels,
            width,
            height,
            mode,
        }
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.mode.channels() as usize
    }

    /// Bytes the buffer must hold, or `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        self.row_bytes().checked_mul(self.height as usize)
    }
}

/// One decoded frame of a sequence.
///
/// Times are in ticks of `timescale` per second.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Interleaved pixels, `width * height * mode.channels()` bytes.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channel layout of `pixels`.
    pub mode: PixelMode,
    /// Ticks per second.
    pub timescale: u64,
    /// Presentation timestamp in ticks.
    pub pts: u64,
    /// Display duration in ticks.
    pub duration: u64,
}

impl Frame {
    /// Presentation timestamp rounded to milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        ticks_to_ms(self.pts, self.timescale)
    }

    /// Duration rounded to milliseconds.
    pub fn duration_ms(&self) -> u64 {
        ticks_to_ms(self.duration, self.timescale)
    }

    /// Typed RGB view, if this frame is RGB.
    pub fn as_rgb8(&self) -> Option<ImgRef<'_, Rgb<u8>>> {
        match self.mode {
            PixelMode::Rgb => Some(Img::new(
                bytemuck::cast_slice(&self.pixels),
                self.width as usize,
                self.height as usize,
            )),
            PixelMode::Rgba => None,
        }
    }

    /// Typed RGBA view, if this frame is RGBA.
    pub fn as_rgba8(&self) -> Option<ImgRef<'_, Rgba<u8>>> {
        match self.mode {
            PixelMode::Rgba => Some(Img::new(
                bytemuck::cast_slice(&self.pixels),
                self.width as usize,
                self.height as usize,
            )),
            PixelMode::Rgb => None,
        }
    }
}

fn ticks_to_ms(ticks: u64, timescale: u64) -> u64 {
    if timescale == 0 {
        return 0;
    }
    let ms = (u128::from(ticks) * 1000 + u128::from(timescale) / 2) / u128::from(timescale);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn mode_names_round_trip() {
        for mode in [PixelMode::Rgb, PixelMode::Rgba] {
            assert_eq!(mode.as_str().parse::<PixelMode>().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_mode_is_value_error() {
        let err = "L".parse::<PixelMode>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.to_string(), "Invalid pixel mode: L");
    }

    #[test]
    fn expected_len_tracks_mode() {
        let data = [0u8; 48];
        assert_eq!(RgbImage::new(&data, 4, 3, PixelMode::Rgb).expected_len(), Some(36));
        assert_eq!(RgbImage::new(&data, 4, 3, PixelMode::Rgba).expected_len(), Some(48));
    }

    #[test]
    fn frame_times_round_to_milliseconds() {
        let frame = Frame {
            pixels: Vec::new(),
            width: 0,
            height: 0,
            mode: PixelMode::Rgb,
            timescale: 30,
            pts: 1,
            duration: 2,
        };
        assert_eq!(frame.timestamp_ms(), 33);
        assert_eq!(frame.duration_ms(), 67);
    }

    #[test]
    fn typed_views_follow_mode() {
        let frame = Frame {
            pixels: vec![1, 2, 3, 4, 5, 6],
            width: 2,
            height: 1,
            mode: PixelMode::Rgb,
            timescale: 1000,
            pts: 0,
            duration: 0,
        };
        let view = frame.as_rgb8().unwrap();
        assert_eq!(view.width(), 2);
        assert_eq!(view.buf()[1], Rgb { r: 4, g: 5, b: 6 });
        assert!(frame.as_rgba8().is_none());
    }
}
