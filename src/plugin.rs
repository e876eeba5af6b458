//! Closure-backed decoders: the narrow boundary an embedding host (a script
//! interpreter, a test, a one-off tool) uses to plug into the registry.
//!
//! A plugin is a type name, an optional detection predicate and a decoding
//! procedure.  It sees nothing of the host but the [`Cursor`] it is handed:
//!
//! ```
//! use hexmark::cursor::ReadKind;
//! use hexmark::decoder::Registry;
//! use hexmark::plugin::PluginDecoder;
//!
//! let mut registry = Registry::new();
//! registry.register(Box::new(
//!     PluginDecoder::new("tag", |c| {
//!         c.read_marked(ReadKind::Bytes(4), "tag: %s")?;
//!         Ok(())
//!     })
//!     .with_detect(|c| Ok(c.len() >= 4)),
//! ))?;
//! # Ok::<(), hexmark::cursor::DecodeError>(())
//! ```
//!
//! # Contract
//! - `detect` receives its own rewound cursor and MUST NOT rely on marks it
//!   emits; its answer is the only thing the registry looks at.
//! - Any error returned by either callback aborts the whole decode pass.

use crate::cursor::{Cursor, DecodeError};
use crate::decoder::Decoder;

type DetectFn = dyn Fn(&mut Cursor<'_>) -> Result<bool, DecodeError>;
type DecodeFn = dyn Fn(&mut Cursor<'_>) -> Result<(), DecodeError>;

pub struct PluginDecoder {
    name:   String,
    detect: Option<Box<DetectFn>>,
    decode: Box<DecodeFn>,
}

impl PluginDecoder {
    pub fn new<F>(name: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&mut Cursor<'_>) -> Result<(), DecodeError> + 'static,
    {
        Self { name: name.into(), detect: None, decode: Box::new(decode) }
    }

    /// Make the plugin take part in auto-detection.
    pub fn with_detect<F>(mut self, detect: F) -> Self
    where
        F: Fn(&mut Cursor<'_>) -> Result<bool, DecodeError> + 'static,
    {
        self.detect = Some(Box::new(detect));
        self
    }
}

impl Decoder for PluginDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_detect(&self) -> bool {
        self.detect.is_some()
    }

    fn detect(&self, cursor: &mut Cursor<'_>) -> Result<bool, DecodeError> {
        match &self.detect {
            Some(detect) => detect(cursor),
            None         => Ok(false),
        }
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<(), DecodeError> {
        (self.decode)(cursor)
    }
}
