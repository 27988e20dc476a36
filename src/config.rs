//! Session configuration.
//!
//! [`EncoderConfig`] and [`DecoderConfig`] are builders in the `with_*` style.
//! Every enumerated option parses from the exact strings a host passes
//! (`"4:2:0"`, `"limited"`, `"bilinear"`, ...) and rejects anything else with
//! a value error.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::{CodecError, Limits, Metadata};

/// Chroma subsampling of the encoded YUV planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Subsampling {
    /// Luma only.
    Yuv400,
    /// Chroma halved in both directions.
    #[default]
    Yuv420,
    /// Chroma halved horizontally.
    Yuv422,
    /// Full-resolution chroma.
    Yuv444,
}

impl Subsampling {
    /// Host string (`"4:2:0"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Subsampling::Yuv400 => "4:0:0",
            Subsampling::Yuv420 => "4:2:0",
            Subsampling::Yuv422 => "4:2:2",
            Subsampling::Yuv444 => "4:4:4",
        }
    }
}

impl fmt::Display for Subsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsampling {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4:0:0" => Ok(Subsampling::Yuv400),
            "4:2:0" => Ok(Subsampling::Yuv420),
            "4:2:2" => Ok(Subsampling::Yuv422),
            "4:4:4" => Ok(Subsampling::Yuv444),
            _ => Err(CodecError::Value(format!("Invalid subsampling: {s}"))),
        }
    }
}

/// Value range of the encoded YUV samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum YuvRange {
    /// 0..=255.
    #[default]
    Full,
    /// 16..=235 luma, 16..=240 chroma.
    Limited,
}

impl YuvRange {
    /// Host string.
    pub fn as_str(self) -> &'static str {
        match self {
            YuvRange::Full => "full",
            YuvRange::Limited => "limited",
        }
    }
}

impl fmt::Display for YuvRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YuvRange {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(YuvRange::Full),
            "limited" => Ok(YuvRange::Limited),
            _ => Err(CodecError::Value("Invalid range".into())),
        }
    }
}

/// Chroma upsampling used when converting decoded YUV to RGB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Upsampling {
    /// Codec default.
    #[default]
    Automatic,
    /// Fastest available filter.
    Fastest,
    /// Best available filter.
    Best,
    /// Nearest neighbour.
    Nearest,
    /// Bilinear.
    Bilinear,
}

impl Upsampling {
    /// Every filter.
    pub const ALL: [Upsampling; 5] = [
        Upsampling::Automatic,
        Upsampling::Fastest,
        Upsampling::Best,
        Upsampling::Nearest,
        Upsampling::Bilinear,
    ];

    /// Host string.
    pub fn as_str(self) -> &'static str {
        match self {
            Upsampling::Automatic => "auto",
            Upsampling::Fastest => "fastest",
            Upsampling::Best => "best",
            Upsampling::Nearest => "nearest",
            Upsampling::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for Upsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Upsampling {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Upsampling::Automatic),
            "fastest" => Ok(Upsampling::Fastest),
            "best" => Ok(Upsampling::Best),
            "nearest" => Ok(Upsampling::Nearest),
            "bilinear" => Ok(Upsampling::Bilinear),
            _ => Err(CodecError::Value(format!("Invalid upsampling option: {s}"))),
        }
    }
}

/// Which registered codec a session should use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodecChoice {
    /// First enabled codec with the needed capability.
    #[default]
    Auto,
    /// A codec by registry name.
    Named(String),
}

impl CodecChoice {
    /// Host string (`"auto"` or the codec name).
    pub fn as_str(&self) -> &str {
        match self {
            CodecChoice::Auto => "auto",
            CodecChoice::Named(name) => name,
        }
    }
}

impl fmt::Display for CodecChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecChoice {
    type Err = CodecError;

    /// Never fails; whether the name exists is checked when a session resolves it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "auto" => CodecChoice::Auto,
            name => CodecChoice::Named(name.to_string()),
        })
    }
}

/// Coding-independent code points (ITU-T H.273).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cicp {
    /// Colour primaries.
    pub color_primaries: u8,
    /// Transfer characteristics.
    pub transfer_characteristics: u8,
    /// Matrix coefficients.
    pub matrix_coefficients: u8,
}

impl Cicp {
    /// Unspecified primaries and transfer; the ICC profile decides.
    pub const ICC: Cicp = Cicp {
        color_primaries: 2,
        transfer_characteristics: 2,
        matrix_coefficients: 6,
    };

    /// BT.709 primaries with the sRGB transfer curve.
    pub const SRGB: Cicp = Cicp {
        color_primaries: 1,
        transfer_characteristics: 13,
        matrix_coefficients: 6,
    };

    /// Code points for a canvas with or without an ICC profile.
    pub fn for_profile(has_icc: bool) -> Cicp {
        if has_icc { Cicp::ICC } else { Cicp::SRGB }
    }
}

/// Fixed format of every frame in one encode session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per sample.
    pub depth: u8,
    /// Chroma subsampling.
    pub subsampling: Subsampling,
    /// Sample range.
    pub range: YuvRange,
    /// Colour code points.
    pub cicp: Cicp,
}

/// Lowest (best) and highest (worst) quantizer on the session scale.
pub const QUANTIZER_MIN: i32 = 0;
/// See [`QUANTIZER_MIN`].
pub const QUANTIZER_MAX: i32 = 63;

/// Animation encoder configuration.
///
/// ```
/// use zenframes::{EncoderConfig, Subsampling};
///
/// let config = EncoderConfig::new()
///     .with_quality(75)
///     .with_subsampling(Subsampling::Yuv444)
///     .with_speed(4);
/// assert_eq!((config.qmin, config.qmax), (0, 25));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Chroma subsampling.
    pub subsampling: Subsampling,
    /// Best allowed quantizer. Clamped to the codec's range at session creation.
    pub qmin: i32,
    /// Worst allowed quantizer. Clamped to the codec's range at session creation.
    pub qmax: i32,
    /// Encoder speed, higher is faster. Clamped to the codec's range.
    pub speed: i32,
    /// Codec selection.
    pub codec: CodecChoice,
    /// Sample range. `None` takes the codec's native range for the subsampling.
    pub range: Option<YuvRange>,
    /// Animation loop count, 0 loops forever.
    pub loop_count: u32,
    /// ICC, EXIF and XMP blobs to attach.
    pub metadata: Metadata,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            subsampling: Subsampling::Yuv420,
            qmin: 0,
            qmax: 10,
            speed: 8,
            codec: CodecChoice::Auto,
            range: None,
            loop_count: 0,
            metadata: Metadata::none(),
        }
    }
}

impl EncoderConfig {
    /// Defaults: 4:2:0, quantizers 0..=10, speed 8, automatic codec, native range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the quantizer bounds from a 0..=100 quality.
    pub fn with_quality(mut self, quality: i32) -> Self {
        let (qmin, qmax) = quantizers_for_quality(quality);
        self.qmin = qmin;
        self.qmax = qmax;
        self
    }

    /// Set the quantizer bounds directly.
    pub fn with_quantizers(mut self, qmin: i32, qmax: i32) -> Self {
        self.qmin = qmin;
        self.qmax = qmax;
        self
    }

    /// Set encoder speed.
    pub fn with_speed(mut self, speed: i32) -> Self {
        self.speed = speed;
        self
    }

    /// Set chroma subsampling.
    pub fn with_subsampling(mut self, subsampling: Subsampling) -> Self {
        self.subsampling = subsampling;
        self
    }

    /// Set the sample range.
    pub fn with_range(mut self, range: YuvRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Select a codec.
    pub fn with_codec(mut self, codec: CodecChoice) -> Self {
        self.codec = codec;
        self
    }

    /// Set the loop count.
    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Attach an ICC profile. An empty profile is treated as absent.
    pub fn with_icc_profile(mut self, icc: impl Into<Vec<u8>>) -> Self {
        self.metadata.icc_profile = crate::limits::non_empty(icc.into());
        self
    }

    /// Attach an EXIF payload. An empty payload is treated as absent.
    pub fn with_exif(mut self, exif: impl Into<Vec<u8>>) -> Self {
        self.metadata.exif = crate::limits::non_empty(exif.into());
        self
    }

    /// Attach an XMP packet. An empty packet is treated as absent.
    pub fn with_xmp(mut self, xmp: impl Into<Vec<u8>>) -> Self {
        self.metadata.xmp = crate::limits::non_empty(xmp.into());
        self
    }

    /// Replace all metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Metadata {
            icc_profile: metadata.icc_profile.and_then(crate::limits::non_empty),
            exif: metadata.exif.and_then(crate::limits::non_empty),
            xmp: metadata.xmp.and_then(crate::limits::non_empty),
        };
        self
    }
}

/// `(qmin, qmax)` for a 0..=100 quality.
pub fn quantizers_for_quality(quality: i32) -> (i32, i32) {
    let qmin = (64 - quality).clamp(QUANTIZER_MIN, QUANTIZER_MAX);
    let qmax = (100 - quality).clamp(QUANTIZER_MIN, QUANTIZER_MAX);
    (qmin, qmax)
}

/// Animation decoder configuration.
#[derive(Clone, Debug, Default)]
pub struct DecoderConfig {
    /// Codec selection.
    pub codec: CodecChoice,
    /// Chroma upsampling.
    pub upsampling: Upsampling,
    /// Limits applied to the container's canvas before any frame is decoded.
    pub limits: Limits,
}

impl DecoderConfig {
    /// Automatic codec, automatic upsampling, no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a codec.
    pub fn with_codec(mut self, codec: CodecChoice) -> Self {
        self.codec = codec;
        self
    }

    /// Set chroma upsampling.
    pub fn with_upsampling(mut self, upsampling: Upsampling) -> Self {
        self.upsampling = upsampling;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
