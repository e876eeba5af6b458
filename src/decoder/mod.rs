//! Decoder registry: name-keyed, kept in registration order.
//!
//! # Dispatch rules
//! - A forced type name is looked up directly and MUST exist.
//! - Otherwise every decoder that can detect is asked, in registration order,
//!   on a freshly rewound copy of the cursor.  The first to answer `true`
//!   wins.  No answer means nothing gets decoded, which is not an error.
//! - Errors raised by `detect` or `decode` are fatal.  There is no "try the
//!   next decoder" fallback; the error is attributed to the decoder that
//!   raised it and propagated.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::cursor::{Cursor, DecodeError};

pub mod gzip;
pub mod png;

// ── Decoder trait ────────────────────────────────────────────────────────────

pub trait Decoder {
    /// Unique type name, as given to `--type`.
    fn name(&self) -> &str;

    /// Whether [`Decoder::detect`] takes part in auto-detection.  Some
    /// formats cannot be recognised by content and are only reachable by name.
    fn can_detect(&self) -> bool {
        false
    }

    /// Decide whether the range holds this decoder's format.  Reads advance
    /// only the copy the registry hands in.
    fn detect(&self, _cursor: &mut Cursor<'_>) -> Result<bool, DecodeError> {
        Ok(false)
    }

    /// Walk the range, emitting marks through the cursor.
    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError>;
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Registry {
    decoders: IndexMap<String, Box<dyn Decoder>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the decoders shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.decoders.insert(png::NAME.to_owned(), Box::new(png::PngDecoder));
        registry.decoders.insert(gzip::NAME.to_owned(), Box::new(gzip::GzipDecoder));
        registry
    }

    pub fn register(&mut self, decoder: Box<dyn Decoder>) -> Result<(), DecodeError> {
        let name = decoder.name().to_owned();
        if self.decoders.contains_key(&name) {
            return Err(DecodeError::DuplicateDecoder(name));
        }
        debug!(decoder = %name, detects = decoder.can_detect(), "registered decoder");
        self.decoders.insert(name, decoder);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Decoder> {
        self.decoders.get(name).map(|d| d.as_ref())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Name of the first decoder recognising `cursor`'s range.
    pub fn identify(&self, cursor: &Cursor<'_>) -> Result<Option<&str>, DecodeError> {
        for (name, decoder) in &self.decoders {
            if !decoder.can_detect() {
                continue;
            }
            let mut probe = cursor.rewound();
            let found = decoder.detect(&mut probe).map_err(|e| e.in_decoder(name))?;
            trace!(decoder = %name, offset = cursor.offset(), found, "detect");
            if found {
                return Ok(Some(name.as_str()));
            }
        }
        Ok(None)
    }

    /// Run `forced`, or the identified decoder, over `cursor`.
    pub fn decode(&self, cursor: &mut Cursor<'_>, forced: Option<&str>) -> Result<(), DecodeError> {
        let name = match forced {
            Some(name) => name,
            None => match self.identify(cursor)? {
                Some(name) => name,
                None => {
                    debug!(offset = cursor.offset(), len = cursor.len(), "no decoder recognised the range");
                    return Ok(());
                }
            },
        };

        let decoder = self
            .get(name)
            .ok_or_else(|| DecodeError::UnknownDecoderName(name.to_owned()))?;
        debug!(decoder = name, offset = cursor.offset(), len = cursor.len(), "decoding");
        decoder.decode(cursor).map_err(|e| e.in_decoder(name))
    }
}
