//! # zenframes
//!
//! Session-based bindings to native image codecs: stateless still-image
//! encode/decode, and animation encoder/decoder sessions with random frame
//! access.
//!
//! Codec backends are feature-gated. The default `webp` feature builds libwebp
//! through `libwebp-sys2`:
//!
//! ```toml
//! [dependencies]
//! zenframes = { version = "0.1", features = ["webp"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zenframes::{AnimDecoder, AnimEncoder, DecoderConfig, EncoderConfig, PixelMode, RgbImage};
//!
//! let (w, h) = (32, 32);
//! let frames: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i * 80; (w * h * 3) as usize]).collect();
//!
//! let mut encoder = AnimEncoder::new(w, h, &EncoderConfig::new().with_quality(90))?;
//! for pixels in &frames {
//!     encoder.add_frame(&RgbImage::new(pixels, w, h, PixelMode::Rgb), 40, false)?;
//! }
//! let bytes = encoder.finish()?;
//!
//! let mut decoder = AnimDecoder::new(bytes, &DecoderConfig::new())?;
//! assert_eq!(decoder.info().frame_count, 3);
//! let first = decoder.frame(0)?;
//! assert_eq!(first.pixels.len(), (w * h * 3) as usize);
//! # Ok::<(), zenframes::CodecError>(())
//! ```
//!
//! Errors carry a host-facing classification, see [`ErrorKind`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

mod config;
mod decode;
mod encode;
mod error;
mod limits;
mod registry;
#[cfg(feature = "webp")]
mod still;

pub mod codecs;
pub mod pixel;
pub mod threads;

pub use config::{
    Cicp, CodecChoice, DecoderConfig, EncoderConfig, ImageDescriptor, QUANTIZER_MAX,
    QUANTIZER_MIN, Subsampling, Upsampling, YuvRange, quantizers_for_quality,
};
pub use decode::{AnimDecoder, ImageInfo};
pub use encode::{AnimEncoder, EncoderState, TIMESCALE};
pub use error::{CodecError, CodecFailure, CodecStatus, ErrorKind};
pub use limits::{Limits, Metadata, buffer_len};
pub use pixel::{Frame, PixelMode, RgbImage};
pub use registry::{CodecRegistry, codec_versions, decoder_codec_available, encoder_codec_available};

#[cfg(feature = "webp")]
pub use codecs::webp::libwebp_version;
#[cfg(feature = "webp")]
pub use still::{DecodedImage, decode_rgb, decode_rgba, decode_with_limits, encode_rgb, encode_rgba};
