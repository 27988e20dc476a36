//! Runtime codec registry for enabling/disabling animation codecs.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::codecs::AnimCodec;
use crate::config::CodecChoice;
use crate::{CodecError, CodecFailure, CodecStatus};

#[derive(Clone, Debug)]
struct Entry {
    codec: Arc<dyn AnimCodec>,
    decode_enabled: bool,
    encode_enabled: bool,
}

/// Runtime codec registry.
///
/// Compile-time features determine which codecs are *available*, while the
/// registry controls which are *enabled* at runtime. Sessions resolve
/// [`CodecChoice::Auto`] to the first enabled codec with the needed capability,
/// in registration order.
#[derive(Clone, Debug)]
pub struct CodecRegistry {
    entries: Vec<Entry>,
}

impl CodecRegistry {
    /// All compiled-in codecs enabled.
    pub fn all() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "webp")]
        {
            registry = registry.with_codec(Arc::new(crate::codecs::webp::Libwebp));
        }

        registry
    }

    /// Compiled-in codecs registered but disabled; caller must opt in.
    pub fn none() -> Self {
        let mut registry = Self::all();
        for entry in &mut registry.entries {
            entry.decode_enabled = false;
            entry.encode_enabled = false;
        }
        registry
    }

    /// No codecs registered at all.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a codec, enabled for whatever it advertises.
    ///
    /// A codec with the same name replaces the earlier registration in place.
    pub fn with_codec(mut self, codec: Arc<dyn AnimCodec>) -> Self {
        let caps = codec.capabilities();
        let entry = Entry {
            codec,
            decode_enabled: caps.decode,
            encode_enabled: caps.encode,
        };
        match self.position(entry.codec.name()) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Enable or disable decoding with a codec.
    pub fn with_decode(mut self, name: &str, enabled: bool) -> Self {
        if let Some(i) = self.position(name) {
            self.entries[i].decode_enabled = enabled;
        }
        self
    }

    /// Enable or disable encoding with a codec.
    pub fn with_encode(mut self, name: &str, enabled: bool) -> Self {
        if let Some(i) = self.position(name) {
            self.entries[i].encode_enabled = enabled;
        }
        self
    }

    /// Is this codec registered, capable AND enabled for decoding?
    pub fn can_decode(&self, name: &str) -> bool {
        self.entry(name)
            .is_some_and(|e| e.decode_enabled && e.codec.capabilities().decode)
    }

    /// Is this codec registered, capable AND enabled for encoding?
    pub fn can_encode(&self, name: &str) -> bool {
        self.entry(name)
            .is_some_and(|e| e.encode_enabled && e.codec.capabilities().encode)
    }

    /// Names of codecs enabled for decoding.
    pub fn decoders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .map(|e| e.codec.name())
            .filter(|name| self.can_decode(name))
    }

    /// Names of codecs enabled for encoding.
    pub fn encoders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .map(|e| e.codec.name())
            .filter(|name| self.can_encode(name))
    }

    /// Every registered codec, enabled or not.
    pub fn codecs(&self) -> impl Iterator<Item = &Arc<dyn AnimCodec>> {
        self.entries.iter().map(|e| &e.codec)
    }

    /// Codec for an encoder session.
    ///
    /// An unknown name, or one that cannot encode, is a value error; no codec
    /// at all for `auto` is a runtime error.
    pub fn resolve_encoder(&self, choice: &CodecChoice) -> Result<Arc<dyn AnimCodec>, CodecError> {
        match choice {
            CodecChoice::Auto => self.first(|name| self.can_encode(name), "encode"),
            CodecChoice::Named(name) => {
                let entry = self
                    .entry(name)
                    .ok_or_else(|| CodecError::Value(format!("Invalid codec: {name}")))?;
                if !self.can_encode(name) {
                    return Err(CodecError::Value(format!("Codec cannot encode: {name}")));
                }
                Ok(Arc::clone(&entry.codec))
            }
        }
    }

    /// Codec for a decoder session. Same rules as [`resolve_encoder`](Self::resolve_encoder).
    pub fn resolve_decoder(&self, choice: &CodecChoice) -> Result<Arc<dyn AnimCodec>, CodecError> {
        match choice {
            CodecChoice::Auto => self.first(|name| self.can_decode(name), "decode"),
            CodecChoice::Named(name) => {
                let entry = self
                    .entry(name)
                    .ok_or_else(|| CodecError::Value(format!("Invalid codec: {name}")))?;
                if !self.can_decode(name) {
                    return Err(CodecError::Value(format!("Codec cannot decode: {name}")));
                }
                Ok(Arc::clone(&entry.codec))
            }
        }
    }

    /// Comma-separated `name [enc/dec]:version` list of registered codecs.
    pub fn codec_versions(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                let caps = e.codec.capabilities();
                let mode = match (caps.encode, caps.decode) {
                    (true, true) => "enc/dec",
                    (true, false) => "enc",
                    (false, true) => "dec",
                    (false, false) => "none",
                };
                format!("{} [{}]:{}", e.codec.name(), mode, e.codec.version())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn first(
        &self,
        capable: impl Fn(&str) -> bool,
        operation: &str,
    ) -> Result<Arc<dyn AnimCodec>, CodecError> {
        self.entries
            .iter()
            .find(|e| capable(e.codec.name()))
            .map(|e| Arc::clone(&e.codec))
            .ok_or_else(|| {
                CodecError::from_codec(
                    format!("No codec available to {operation}"),
                    CodecFailure::new(CodecStatus::NoCodecAvailable),
                )
            })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.codec.name() == name)
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.codec.name() == name)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::all()
    }
}

/// Whether `name` is a compiled-in codec that can encode. `"auto"` is not a codec.
pub fn encoder_codec_available(name: &str) -> bool {
    CodecRegistry::all().can_encode(name)
}

/// Whether `name` is a compiled-in codec that can decode. `"auto"` is not a codec.
pub fn decoder_codec_available(name: &str) -> bool {
    CodecRegistry::all().can_decode(name)
}

/// Versions of all compiled-in codecs. See [`CodecRegistry::codec_versions`].
pub fn codec_versions() -> String {
    CodecRegistry::all().codec_versions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::codecs::{
        Capabilities, DecoderSettings, EncoderSettings, SequenceDecoder, SequenceEncoder,
    };
    use alloc::boxed::Box;
    use core::ops::RangeInclusive;

    #[derive(Debug)]
    struct DecodeOnly;

    impl AnimCodec for DecodeOnly {
        fn name(&self) -> &'static str {
            "decode-only"
        }
        fn version(&self) -> String {
            "0.1.0".into()
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                encode: false,
                decode: true,
            }
        }
        fn quantizer_range(&self) -> RangeInclusive<u8> {
            0..=63
        }
        fn speed_range(&self) -> RangeInclusive<u8> {
            0..=10
        }
        fn new_encoder(&self, _: &EncoderSettings) -> Result<Box<dyn SequenceEncoder>, CodecFailure> {
            Err(CodecStatus::NotImplemented.into())
        }
        fn new_decoder(
            &self,
            _: Arc<[u8]>,
            _: &DecoderSettings,
        ) -> Result<Box<dyn SequenceDecoder>, CodecFailure> {
            Err(CodecStatus::NotImplemented.into())
        }
    }

    #[test]
    fn none_registry() {
        let registry = CodecRegistry::none();
        assert!(registry.encoders().next().is_none());
        assert!(registry.decoders().next().is_none());
        assert!(!registry.can_decode("libwebp"));
    }

    #[test]
    fn capability_limits_enablement() {
        let registry = CodecRegistry::empty()
            .with_codec(Arc::new(DecodeOnly))
            .with_encode("decode-only", true);
        assert!(registry.can_decode("decode-only"));
        assert!(!registry.can_encode("decode-only"));
    }

    #[test]
    fn toggle_codec() {
        let registry = CodecRegistry::empty()
            .with_codec(Arc::new(DecodeOnly))
            .with_decode("decode-only", false);
        assert!(!registry.can_decode("decode-only"));
    }

    #[test]
    fn auto_is_not_a_codec_name() {
        assert!(!encoder_codec_available("auto"));
        assert!(!decoder_codec_available("auto"));
        assert!(!decoder_codec_available("nonexistent"));
    }

    #[test]
    fn named_resolution_errors_are_value_errors() {
        let registry = CodecRegistry::empty().with_codec(Arc::new(DecodeOnly));

        let err = registry
            .resolve_encoder(&CodecChoice::Named("bogus".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.to_string(), "Invalid codec: bogus");

        let err = registry
            .resolve_encoder(&CodecChoice::Named("decode-only".into()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Codec cannot encode: decode-only");

        assert!(registry.resolve_decoder(&CodecChoice::Auto).is_ok());
    }

    #[test]
    fn auto_without_codecs_is_runtime_error() {
        let err = CodecRegistry::empty()
            .resolve_encoder(&CodecChoice::Auto)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.status(), Some(CodecStatus::NoCodecAvailable));
    }

    #[test]
    fn versions_list_capabilities() {
        let registry = CodecRegistry::empty().with_codec(Arc::new(DecodeOnly));
        assert_eq!(registry.codec_versions(), "decode-only [dec]:0.1.0");
    }

    #[cfg(feature = "webp")]
    #[test]
    fn libwebp_is_registered() {
        assert!(encoder_codec_available("libwebp"));
        assert!(decoder_codec_available("libwebp"));
        assert!(codec_versions().starts_with("libwebp [enc/dec]:"));
    }
}
