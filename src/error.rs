//! Unified error types for codec sessions.
//!
//! Every failure surfaced by this crate is a [`CodecError`]. Hosts that need a
//! coarse classification (to pick an exception type, an exit code, ...) use
//! [`CodecError::kind`].
//!
//! Codec libraries report failures as a [`CodecStatus`]. The mapping from a
//! status to an [`ErrorKind`] lives in [`CodecStatus::kind`]:
//!
//! | Status | Kind |
//! |---|---|
//! | `InvalidSignature`, `InvalidExifPayload` | [`ErrorKind::Value`] |
//! | `BitstreamParseFailed`, `TruncatedData`, `NoContent` | [`ErrorKind::Syntax`] |
//! | anything else | [`ErrorKind::Runtime`] |

use alloc::string::String;
use core::fmt;

/// Result code reported by a codec backend.
///
/// Backends translate their native result codes into this set. The variants
/// are modelled on the result codes of the common image-sequence libraries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecStatus {
    /// Unclassified codec failure.
    UnknownError,
    /// Container signature (file type box, RIFF header, ...) is not recognized.
    InvalidSignature,
    /// Container parsed but holds no image.
    NoContent,
    /// Container or bitstream structure could not be parsed.
    BitstreamParseFailed,
    /// Input ended before the container or bitstream was complete.
    TruncatedData,
    /// EXIF payload has no TIFF header.
    InvalidExifPayload,
    /// Requested frame index is past the end of the sequence.
    NoImagesRemaining,
    /// RGB to YUV conversion failed.
    ReformatFailed,
    /// Encoder rejected a frame.
    EncodeFailed,
    /// Decoder failed on a frame.
    DecodeFailed,
    /// Codec rejected an argument.
    InvalidArgument,
    /// Frame does not match the sequence it is added to.
    IncompatibleImage,
    /// Codec does not implement the requested feature.
    NotImplemented,
    /// No codec with the requested capability is available.
    NoCodecAvailable,
    /// Codec allocation failed.
    OutOfMemory,
}

impl CodecStatus {
    /// Human-readable description, as a codec's `result_to_string` would give.
    pub fn description(self) -> &'static str {
        match self {
            CodecStatus::UnknownError => "unknown error",
            CodecStatus::InvalidSignature => "invalid file type signature",
            CodecStatus::NoContent => "no content",
            CodecStatus::BitstreamParseFailed => "container parse failed",
            CodecStatus::TruncatedData => "truncated data",
            CodecStatus::InvalidExifPayload => "invalid EXIF payload",
            CodecStatus::NoImagesRemaining => "no images remaining",
            CodecStatus::ReformatFailed => "reformat failed",
            CodecStatus::EncodeFailed => "encoding of color planes failed",
            CodecStatus::DecodeFailed => "decoding of color planes failed",
            CodecStatus::InvalidArgument => "invalid argument",
            CodecStatus::IncompatibleImage => "incompatible image",
            CodecStatus::NotImplemented => "not implemented",
            CodecStatus::NoCodecAvailable => "no codec available",
            CodecStatus::OutOfMemory => "out of memory",
        }
    }

    /// Classify this status for the host.
    pub fn kind(self) -> ErrorKind {
        match self {
            CodecStatus::InvalidSignature | CodecStatus::InvalidExifPayload => ErrorKind::Value,
            CodecStatus::BitstreamParseFailed
            | CodecStatus::TruncatedData
            | CodecStatus::NoContent => ErrorKind::Syntax,
            _ => ErrorKind::Runtime,
        }
    }
}

impl fmt::Display for CodecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A failed codec call: the status plus the codec's own diagnostic, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecFailure {
    /// Classified result code.
    pub status: CodecStatus,
    /// Free-form diagnostic from the codec library.
    pub detail: Option<String>,
}

impl CodecFailure {
    /// Failure without a codec diagnostic.
    pub fn new(status: CodecStatus) -> Self {
        Self {
            status,
            detail: None,
        }
    }

    /// Failure carrying the codec's diagnostic string.
    pub fn with_detail(status: CodecStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }
}

impl From<CodecStatus> for CodecFailure {
    fn from(status: CodecStatus) -> Self {
        Self::new(status)
    }
}

impl fmt::Display for CodecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.status, detail),
            None => write!(f, "{}", self.status),
        }
    }
}

impl core::error::Error for CodecFailure {}

/// Host-facing error classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed argument shape from the caller.
    Argument,
    /// Invalid option value, dimension or payload.
    Value,
    /// Truncated or unparseable bitstream.
    Syntax,
    /// Any other codec or resource failure.
    Runtime,
    /// Buffer size overflow or limit exceeded before allocation.
    Memory,
    /// Session method called out of order.
    InvalidState,
}

/// Unified error type for codec sessions and still-image calls.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Caller supplied arguments of the wrong shape.
    #[error("{0}")]
    Argument(String),

    /// Invalid option value or dimensions, detected by this crate.
    #[error("{0}")]
    Value(String),

    /// Codec failure classified by [`CodecStatus::kind`].
    #[error("{context}: {source}")]
    Codec {
        /// What was being attempted ("Failed to decode image", ...).
        context: String,
        /// The codec's result.
        #[source]
        source: CodecFailure,
    },

    /// Buffer size computation overflowed or exceeded [`Limits`](crate::Limits).
    #[error("{0}")]
    Memory(String),

    /// Resource creation failed outside any codec call.
    #[error("{0}")]
    Runtime(String),

    /// A session method was called in a state that does not allow it.
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// Session state at the time of the call.
        state: &'static str,
    },
}

impl CodecError {
    /// Wrap a codec failure with the operation it interrupted.
    pub fn from_codec(context: impl Into<String>, failure: impl Into<CodecFailure>) -> Self {
        CodecError::Codec {
            context: context.into(),
            source: failure.into(),
        }
    }

    /// Host-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Argument(_) => ErrorKind::Argument,
            CodecError::Value(_) => ErrorKind::Value,
            CodecError::Codec { source, .. } => source.status.kind(),
            CodecError::Memory(_) => ErrorKind::Memory,
            CodecError::Runtime(_) => ErrorKind::Runtime,
            CodecError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// The codec status, when the error came from a codec call.
    pub fn status(&self) -> Option<CodecStatus> {
        match self {
            CodecError::Codec { source, .. } => Some(source.status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_signature_is_value_error() {
        assert_eq!(CodecStatus::InvalidSignature.kind(), ErrorKind::Value);
        assert_eq!(CodecStatus::InvalidExifPayload.kind(), ErrorKind::Value);
    }

    #[test]
    fn truncated_and_unparseable_are_syntax_errors() {
        assert_eq!(CodecStatus::BitstreamParseFailed.kind(), ErrorKind::Syntax);
        assert_eq!(CodecStatus::TruncatedData.kind(), ErrorKind::Syntax);
        assert_eq!(CodecStatus::NoContent.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn everything_else_is_runtime() {
        for status in [
            CodecStatus::UnknownError,
            CodecStatus::NoImagesRemaining,
            CodecStatus::ReformatFailed,
            CodecStatus::EncodeFailed,
            CodecStatus::DecodeFailed,
            CodecStatus::InvalidArgument,
            CodecStatus::OutOfMemory,
        ] {
            assert_eq!(status.kind(), ErrorKind::Runtime, "{status:?}");
        }
    }

    #[test]
    fn codec_error_message_includes_context_and_description() {
        let err = CodecError::from_codec("Failed to decode frame 3", CodecStatus::NoImagesRemaining);
        assert_eq!(err.to_string(), "Failed to decode frame 3: no images remaining");
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.status(), Some(CodecStatus::NoImagesRemaining));
    }

    #[test]
    fn codec_detail_is_appended() {
        let failure = CodecFailure::with_detail(CodecStatus::EncodeFailed, "frame too large");
        let err = CodecError::from_codec("Failed to encode image", failure);
        assert_eq!(
            err.to_string(),
            "Failed to encode image: encoding of color planes failed (frame too large)"
        );
    }

    #[test]
    fn invalid_state_message() {
        let err = CodecError::InvalidState {
            operation: "add a frame",
            state: "finished",
        };
        assert_eq!(err.to_string(), "cannot add a frame in state finished");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
