//! Resource limits and metadata types.

use alloc::format;
use alloc::vec::Vec;

use crate::CodecError;

/// Resource limits for decode operations.
///
/// Checked against codec-reported dimensions before any output buffer is
/// allocated. All limits are optional.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    /// Maximum image width in pixels.
    pub max_width: Option<u64>,
    /// Maximum image height in pixels.
    pub max_height: Option<u64>,
    /// Maximum total pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum size of a single output buffer in bytes.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Create a new Limits with no restrictions.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if dimensions are within limits.
    ///
    /// Returns `Err` with a description if any limit is exceeded.
    pub fn check_dimensions(&self, width: u64, height: u64) -> Result<(), &'static str> {
        if let Some(max_width) = self.max_width {
            if width > max_width {
                return Err("width exceeds limit");
            }
        }

        if let Some(max_height) = self.max_height {
            if height > max_height {
                return Err("height exceeds limit");
            }
        }

        if let Some(max_pixels) = self.max_pixels {
            let pixels = width.saturating_mul(height);
            if pixels > max_pixels {
                return Err("pixel count exceeds limit");
            }
        }

        Ok(())
    }

    /// Check if a buffer allocation is within limits.
    pub fn check_memory(&self, bytes: u64) -> Result<(), &'static str> {
        if let Some(max_memory) = self.max_memory_bytes {
            if bytes > max_memory {
                return Err("memory allocation exceeds limit");
            }
        }
        Ok(())
    }

    /// Size in bytes of an interleaved 8-bit buffer, validated against these
    /// limits and against the largest allocation the platform allows.
    pub fn validate(&self, width: u32, height: u32, channels: u32) -> Result<usize, CodecError> {
        let len = buffer_len(width, height, channels)?;
        self.check_dimensions(u64::from(width), u64::from(height))
            .map_err(|e| CodecError::Memory(format!("{e}: {width}x{height}")))?;
        self.check_memory(len as u64)
            .map_err(|e| CodecError::Memory(format!("{e}: {len} bytes")))?;
        Ok(len)
    }
}

/// `width * channels * height`, failing instead of wrapping.
///
/// The result never exceeds `isize::MAX`, the largest size a Rust allocation
/// may have.
pub fn buffer_len(width: u32, height: u32, channels: u32) -> Result<usize, CodecError> {
    let overflow = || CodecError::Memory("Integer overflow in pixel size".into());
    let row_bytes = usize::try_from(width)
        .ok()
        .and_then(|w| w.checked_mul(channels as usize))
        .ok_or_else(overflow)?;
    let len = row_bytes
        .checked_mul(height as usize)
        .filter(|&len| len <= isize::MAX as usize)
        .ok_or_else(overflow)?;
    Ok(len)
}

/// Image metadata blobs (ICC profile, EXIF, XMP).
///
/// Used when encoding to attach metadata and returned when decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// ICC color profile.
    pub icc_profile: Option<Vec<u8>>,
    /// EXIF metadata.
    pub exif: Option<Vec<u8>>,
    /// XMP metadata.
    pub xmp: Option<Vec<u8>>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether no blob is present.
    pub fn is_empty(&self) -> bool {
        self.icc_profile.is_none() && self.exif.is_none() && self.xmp.is_none()
    }
}

/// Treat an empty blob as absent.
pub(crate) fn non_empty(bytes: Vec<u8>) -> Option<Vec<u8>> {
    if bytes.is_empty() { None } else { Some(bytes) }
}
