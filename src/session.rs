//! One decode pass over one loaded buffer.
//!
//! A [`Session`] owns the byte store, the decoder registry and the mark store,
//! and every cursor borrows it.  The pass runs to completion before the marks
//! are flattened; a failed pass leaves no marks behind and never reaches
//! flattening.
//!
//! ```
//! use hexmark::decoder::Registry;
//! use hexmark::session::Session;
//! use hexmark::store::ByteStore;
//!
//! let store = ByteStore::new(b"\x1f\x8b\x08\0\0\0\0\0\0\x03".to_vec(), 0);
//! let annotated = Session::new(store, Registry::with_builtins()).annotate(None)?;
//! assert!(!annotated.fields.marks_at(0).is_empty());
//! # Ok::<(), hexmark::cursor::DecodeError>(())
//! ```

use std::cell::RefCell;

use tracing::{info, warn};

use crate::cursor::{Cursor, DecodeError};
use crate::decoder::Registry;
use crate::flatten::flatten;
use crate::index::FieldMap;
use crate::marks::MarkStore;
use crate::store::ByteStore;

pub struct Session {
    store:    ByteStore,
    registry: Registry,
    marks:    RefCell<MarkStore>,
}

/// The outcome of a successful pass: the bytes and their field map, both
/// read-only from here on.
#[derive(Debug, Clone)]
pub struct Annotated {
    pub store:  ByteStore,
    pub fields: FieldMap,
}

impl Session {
    pub fn new(store: ByteStore, registry: Registry) -> Self {
        Self { store, registry, marks: RefCell::new(MarkStore::new()) }
    }

    pub fn store(&self) -> &ByteStore { &self.store }

    pub fn registry(&self) -> &Registry { &self.registry }

    /// Cursor over the whole store.
    pub fn root(&self) -> Cursor<'_> {
        Cursor::new(self, self.store.base(), self.store.len())
    }

    /// Record a mark at an absolute offset; see [`MarkStore::add`].
    pub fn mark(&self, offset: u64, len: i64, description: impl Into<String>) -> bool {
        self.marks.borrow_mut().add(offset, len, description)
    }

    pub fn mark_count(&self) -> usize {
        self.marks.borrow().len()
    }

    /// Decode the whole store with `forced` or an auto-detected decoder.
    ///
    /// On failure every mark recorded so far is discarded: a half-populated
    /// store would not match what the bytes actually contain.
    pub fn decode(&self, forced: Option<&str>) -> Result<(), DecodeError> {
        let mut root = self.root();
        let result = root.decode(forced);
        match &result {
            Ok(()) => info!(marks = self.mark_count(), "decoding finished"),
            Err(e) => {
                let discarded = self.marks.borrow_mut().discard();
                warn!(error = %e, discarded, "decoding failed");
            }
        }
        result
    }

    /// Flatten whatever has been marked so far.
    pub fn finish(self) -> Annotated {
        let marks = self.marks.into_inner().into_marks();
        let fields = flatten(marks, self.store.range());
        Annotated { store: self.store, fields }
    }

    /// The full pipeline: decode, then flatten.  A failed decode consumes the
    /// session without flattening anything.
    pub fn annotate(self, forced: Option<&str>) -> Result<Annotated, DecodeError> {
        self.decode(forced)?;
        Ok(self.finish())
    }
}
