//! The loaded byte buffer and its absolute offset range.

use std::ops::Range;

/// Immutable bytes loaded from the input, positioned at `base` within it.
///
/// Every cursor and mark refers to absolute offsets, so `bytes[0]` lives at
/// `base` and the last byte at `base + len - 1`.
#[derive(Debug, Clone, Default)]
pub struct ByteStore {
    bytes: Vec<u8>,
    base:  u64,
}

impl ByteStore {
    pub fn new(bytes: Vec<u8>, base: u64) -> Self {
        Self { bytes, base }
    }

    pub fn base(&self) -> u64 { self.base }

    pub fn len(&self) -> u64 { self.bytes.len() as u64 }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// One past the last absolute offset.
    pub fn end(&self) -> u64 { self.base + self.len() }

    pub fn range(&self) -> Range<u64> { self.base..self.end() }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    /// Bytes at absolute `offset`, or `None` if any of them lies outside.
    pub fn get(&self, offset: u64, len: u64) -> Option<&[u8]> {
        let start = offset.checked_sub(self.base)?;
        let end = start.checked_add(len)?;
        if end > self.len() {
            return None;
        }
        Some(&self.bytes[start as usize..end as usize])
    }
}
