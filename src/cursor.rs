//! Cursors: positioned, endianness-aware views over a sub-range of the
//! [`ByteStore`](crate::store::ByteStore), used by decoders to read fields and
//! emit marks.
//!
//! # Sub-ranging
//! [`Cursor::subrange`] follows `string.sub` conventions: indices are 1-based
//! and inclusive, negative indices count back from the end, and both bounds
//! are clamped to the cursor.  A cursor can therefore never grow beyond its
//! parent.  An inverted range yields an empty cursor that keeps the parent's
//! offset rather than jumping to wherever `start` pointed.
//!
//! # Reads and marks
//! Every successful read remembers its extent so that it can be marked
//! afterwards with [`Cursor::mark_last_read`].  [`Cursor::read_marked`] and
//! [`Cursor::read_filtered`] do read, format and mark in one step, which is
//! how most decoders describe their fields.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

use crate::format::{self, Value};
use crate::session::Session;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("reading {len} byte(s) at offset {offset:#x} is out of bounds")]
    OutOfBounds { offset: u64, len: u64 },
    #[error("unexpected EOF: no string terminator after offset {offset:#x}")]
    UnterminatedString { offset: u64 },
    #[error("a decoder has already been registered for `{0}'")]
    DuplicateDecoder(String),
    #[error("unknown type: {0}")]
    UnknownDecoderName(String),
    #[error("invalid integer width: {0}")]
    InvalidWidth(usize),
    #[error("position out of range: {0}")]
    InvalidPosition(u64),
    #[error("bad format `{template}': {reason}")]
    Format { template: String, reason: String },
    /// Raised by decoders for data they cannot make sense of.
    #[error("{0}")]
    Malformed(String),
    /// Any failure surfaced from inside a decoder's `detect` or `decode`.
    #[error("{decoder}: {source}")]
    Callback {
        decoder: String,
        #[source]
        source:  Box<DecodeError>,
    },
}

impl DecodeError {
    /// Attribute the error to `decoder`, unless a nested decoder already
    /// claimed it.
    pub fn in_decoder(self, decoder: &str) -> Self {
        match self {
            e @ DecodeError::Callback { .. } => e,
            e => DecodeError::Callback { decoder: decoder.to_owned(), source: Box::new(e) },
        }
    }

    /// The error underneath any decoder attribution.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Callback { source, .. } => source.root_cause(),
            e => e,
        }
    }

    /// Name of the decoder the error was raised in, if any.
    pub fn decoder(&self) -> Option<&str> {
        match self {
            DecodeError::Callback { decoder, .. } => Some(decoder),
            _ => None,
        }
    }
}

// ── Endianness ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

// ── Read kinds ───────────────────────────────────────────────────────────────

/// What a composed read ([`Cursor::read`], [`Cursor::read_marked`]) consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    Bytes(u64),
    CString,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
}

impl ReadKind {
    fn integer(self) -> Option<(usize, bool)> {
        match self {
            ReadKind::U8  => Some((1, false)),
            ReadKind::S8  => Some((1, true)),
            ReadKind::U16 => Some((2, false)),
            ReadKind::S16 => Some((2, true)),
            ReadKind::U32 => Some((4, false)),
            ReadKind::S32 => Some((4, true)),
            ReadKind::U64 => Some((8, false)),
            ReadKind::S64 => Some((8, true)),
            ReadKind::Bytes(_) | ReadKind::CString => None,
        }
    }
}

// ── Cursor ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Cursor<'s> {
    session:    &'s Session,
    offset:     u64,
    len:        u64,
    position:   u64,
    endianness: Endianness,
    /// `(position before the read, bytes consumed)` of the last read.
    last_read:  Option<(u64, u64)>,
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("position", &self.position)
            .field("endianness", &self.endianness)
            .finish()
    }
}

impl<'s> Cursor<'s> {
    /// The caller guarantees `[offset, offset + len)` lies within the store.
    pub(crate) fn new(session: &'s Session, offset: u64, len: u64) -> Self {
        Self {
            session,
            offset,
            len,
            position: 0,
            endianness: Endianness::default(),
            last_read: None,
        }
    }

    pub fn session(&self) -> &'s Session { self.session }

    /// Absolute offset of the first byte.
    pub fn offset(&self) -> u64 { self.offset }

    pub fn len(&self) -> u64 { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Read position relative to [`Cursor::offset`], in `[0, len]`.
    pub fn position(&self) -> u64 { self.position }

    pub fn set_position(&mut self, position: u64) -> Result<(), DecodeError> {
        if position > self.len {
            return Err(DecodeError::InvalidPosition(position));
        }
        self.position = position;
        Ok(())
    }

    pub fn remaining(&self) -> u64 { self.len - self.position }

    pub fn is_eof(&self) -> bool { self.position >= self.len }

    pub fn endianness(&self) -> Endianness { self.endianness }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// All bytes covered by the cursor, regardless of position.
    pub fn as_bytes(&self) -> &'s [u8] {
        self.session.store().get(self.offset, self.len).unwrap_or_default()
    }

    // ── Deriving ─────────────────────────────────────────────────────────────

    /// 1-based, inclusive sub-range; see the module docs for the rules.
    pub fn subrange(&self, start: i64, end: i64) -> Cursor<'s> {
        let len = self.len as i64;
        let start = if start < 0 { start + len + 1 } else { start }.max(1);
        let end = if end < 0 { end + len + 1 } else { end }.min(len);

        let (offset, len) = if start > end {
            (self.offset, 0)
        } else {
            (self.offset + start as u64 - 1, (end - start + 1) as u64)
        };
        Cursor {
            endianness: self.endianness,
            ..Cursor::new(self.session, offset, len)
        }
    }

    /// Same range, read position back at the start.
    pub fn rewound(&self) -> Cursor<'s> {
        self.subrange(1, -1)
    }

    /// Carve the next `n` bytes into their own cursor and skip past them.
    pub fn take(&mut self, n: u64) -> Result<Cursor<'s>, DecodeError> {
        let start = self.position;
        self.read_bytes(n)?;
        Ok(Cursor {
            endianness: self.endianness,
            ..Cursor::new(self.session, self.offset + start, n)
        })
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn read_bytes(&mut self, n: u64) -> Result<&'s [u8], DecodeError> {
        let start = self.offset + self.position;
        let out_of_bounds = DecodeError::OutOfBounds { offset: start, len: n };
        let end = self
            .position
            .checked_add(n)
            .filter(|&end| end <= self.len)
            .ok_or(out_of_bounds.clone())?;
        let bytes = self.session.store().get(start, n).ok_or(out_of_bounds)?;

        self.last_read = Some((self.position, n));
        self.position = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: u64) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    /// NUL-terminated string; the terminator is consumed but not returned.
    pub fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let start = self.offset + self.position;
        let rest = self
            .session
            .store()
            .get(start, self.remaining())
            .ok_or(DecodeError::OutOfBounds { offset: start, len: self.remaining() })?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnterminatedString { offset: start })?;

        let text = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.last_read = Some((self.position, nul as u64 + 1));
        self.position += nul as u64 + 1;
        Ok(text)
    }

    /// `width`-byte integer in the cursor's endianness.  Unsigned reads give
    /// [`Value::UInt`], signed ones are sign-extended into [`Value::Int`].
    pub fn read_int(&mut self, width: usize, signed: bool) -> Result<Value, DecodeError> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(DecodeError::InvalidWidth(width));
        }
        let bytes = self.read_bytes(width as u64)?;
        Ok(match (self.endianness, signed) {
            (Endianness::Little, false) => Value::UInt(LittleEndian::read_uint(bytes, width)),
            (Endianness::Little, true)  => Value::Int(LittleEndian::read_int(bytes, width)),
            (Endianness::Big, false)    => Value::UInt(BigEndian::read_uint(bytes, width)),
            (Endianness::Big, true)     => Value::Int(BigEndian::read_int(bytes, width)),
        })
    }

    fn uint(&mut self, width: usize) -> Result<u64, DecodeError> {
        let v = self.read_int(width, false)?;
        Ok(v.as_u64().unwrap_or_default())
    }

    fn sint(&mut self, width: usize) -> Result<i64, DecodeError> {
        let v = self.read_int(width, true)?;
        Ok(v.as_i64().unwrap_or_default())
    }

    pub fn u8(&mut self)  -> Result<u8,  DecodeError> { self.uint(1).map(|v| v as u8) }
    pub fn s8(&mut self)  -> Result<i8,  DecodeError> { self.sint(1).map(|v| v as i8) }
    pub fn u16(&mut self) -> Result<u16, DecodeError> { self.uint(2).map(|v| v as u16) }
    pub fn s16(&mut self) -> Result<i16, DecodeError> { self.sint(2).map(|v| v as i16) }
    pub fn u32(&mut self) -> Result<u32, DecodeError> { self.uint(4).map(|v| v as u32) }
    pub fn s32(&mut self) -> Result<i32, DecodeError> { self.sint(4).map(|v| v as i32) }
    pub fn u64(&mut self) -> Result<u64, DecodeError> { self.uint(8) }
    pub fn s64(&mut self) -> Result<i64, DecodeError> { self.sint(8) }

    pub fn read(&mut self, kind: ReadKind) -> Result<Value, DecodeError> {
        match kind {
            ReadKind::Bytes(n) => Ok(Value::Bytes(self.read_bytes(n)?.to_vec())),
            ReadKind::CString  => Ok(Value::Str(self.read_cstring()?)),
            _ => {
                let (width, signed) = kind.integer().unwrap_or((1, false));
                self.read_int(width, signed)
            }
        }
    }

    /// Read, then mark the bytes with `template` applied to the value.
    pub fn read_marked(&mut self, kind: ReadKind, template: &str) -> Result<Value, DecodeError> {
        let value = self.read(kind)?;
        let description = format::format(template, std::slice::from_ref(&value))?;
        self.mark_last_read(description);
        Ok(value)
    }

    /// Like [`Cursor::read_marked`], with `filter` transforming the value
    /// first.  The values it returns are the template's arguments; returning
    /// none keeps the raw value.  The raw value is what gets returned.
    pub fn read_filtered<F>(
        &mut self,
        kind:     ReadKind,
        template: &str,
        filter:   F,
    ) -> Result<Value, DecodeError>
    where
        F: FnOnce(&Value) -> Vec<Value>,
    {
        let value = self.read(kind)?;
        let args = filter(&value);
        let description = if args.is_empty() {
            format::format(template, std::slice::from_ref(&value))?
        } else {
            format::format(template, &args)?
        };
        self.mark_last_read(description);
        Ok(value)
    }

    // ── Marks ────────────────────────────────────────────────────────────────

    /// Mark the bytes consumed by the most recent read.  Returns `false` when
    /// nothing was recorded (no read yet, or it consumed zero bytes).
    pub fn mark_last_read(&self, description: impl Into<String>) -> bool {
        match self.last_read {
            Some((_, len)) => self.mark_last_read_len(len as i64, description),
            None => false,
        }
    }

    /// Mark `len` bytes starting where the most recent read started, which
    /// may cover more or less than the read itself.
    pub fn mark_last_read_len(&self, len: i64, description: impl Into<String>) -> bool {
        match self.last_read {
            Some((position, _)) => self.session.mark(self.offset + position, len, description),
            None => false,
        }
    }

    /// Mark the whole cursor range.
    pub fn mark(&self, description: impl Into<String>) -> bool {
        self.session.mark(self.offset, self.len as i64, description)
    }

    pub fn mark_fmt(&self, template: &str, args: &[Value]) -> Result<bool, DecodeError> {
        Ok(self.mark(format::format(template, args)?))
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Name of the first registered decoder recognising this range.
    pub fn identify(&self) -> Result<Option<&'s str>, DecodeError> {
        self.session.registry().identify(self)
    }

    /// Decode this range with `forced` or, failing that, whatever
    /// [`Cursor::identify`] picks.
    pub fn decode(&mut self, forced: Option<&str>) -> Result<(), DecodeError> {
        let registry = self.session.registry();
        registry.decode(self, forced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Registry;
    use crate::store::ByteStore;

    fn session(bytes: &[u8], base: u64) -> Session {
        Session::new(ByteStore::new(bytes.to_vec(), base), Registry::new())
    }

    #[test]
    fn subrange_identity() {
        let s = session(&[0; 16], 32);
        let root = s.root();
        let same = root.subrange(1, root.len() as i64);
        assert_eq!((same.offset(), same.len()), (32, 16));
        let same = root.subrange(1, -1);
        assert_eq!((same.offset(), same.len()), (32, 16));
    }

    #[test]
    fn subrange_negative_and_clamped() {
        let s = session(&[0; 16], 0);
        let root = s.root();

        let tail = root.subrange(-4, -1);
        assert_eq!((tail.offset(), tail.len()), (12, 4));

        let clamped = root.subrange(0, 100);
        assert_eq!((clamped.offset(), clamped.len()), (0, 16));

        let nested = root.subrange(5, 12).subrange(2, 3);
        assert_eq!((nested.offset(), nested.len()), (5, 2));
    }

    #[test]
    fn inverted_subrange_keeps_parent_offset() {
        let s = session(&[0; 16], 0);
        let child = s.root().subrange(5, 12);

        let empty = child.subrange(6, 2);
        assert_eq!((empty.offset(), empty.len()), (4, 0));

        let past_end = child.subrange(20, 30);
        assert_eq!((past_end.offset(), past_end.len()), (4, 0));
    }

    #[test]
    fn subrange_resets_position_and_copies_endianness() {
        let s = session(&[1, 2, 3, 4], 0);
        let mut root = s.root();
        root.set_endianness(Endianness::Big);
        root.skip(2).unwrap();

        let mut child = root.subrange(1, 2);
        assert_eq!(child.position(), 0);
        assert_eq!(child.endianness(), Endianness::Big);
        assert_eq!(child.u16().unwrap(), 0x0102);
        assert_eq!(root.position(), 2);
    }

    #[test]
    fn integers_follow_endianness() {
        let s = session(&[0x01, 0x02, 0xff, 0xfe, 0, 0, 0, 0x80], 0);
        let mut c = s.root();
        assert_eq!(c.u16().unwrap(), 0x0201);
        assert_eq!(c.s16().unwrap(), -257);

        let mut c = s.root();
        c.set_endianness(Endianness::Big);
        assert_eq!(c.u32().unwrap(), 0x0102_fffe);
        assert_eq!(c.u32().unwrap(), 0x80);

        let mut c = s.root();
        assert_eq!(c.s64().unwrap(), i64::from_le_bytes([0x01, 0x02, 0xff, 0xfe, 0, 0, 0, 0x80]));

        let mut c = s.root().subrange(3, 3);
        assert_eq!(c.read_int(1, true).unwrap(), Value::Int(-1));
    }

    #[test]
    fn invalid_width_does_not_advance() {
        let s = session(&[0; 8], 0);
        let mut c = s.root();
        assert_eq!(c.read_int(3, false), Err(DecodeError::InvalidWidth(3)));
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let s = session(&[0; 8], 0x10);
        let mut c = s.root().subrange(1, 3);
        assert_eq!(c.u16().unwrap(), 0);
        assert_eq!(c.u16(), Err(DecodeError::OutOfBounds { offset: 0x12, len: 2 }));
        assert_eq!(c.position(), 2);
        assert!(c.read_bytes(u64::MAX).is_err());
    }

    #[test]
    fn cstrings() {
        let s = session(b"abc\0de", 0);
        let mut c = s.root();
        assert_eq!(c.read_cstring().unwrap(), "abc");
        assert_eq!(c.position(), 4);
        assert_eq!(c.read_cstring(), Err(DecodeError::UnterminatedString { offset: 4 }));

        // The terminator must lie within the cursor, not just the store.
        let mut c = s.root().subrange(1, 3);
        assert!(matches!(c.read_cstring(), Err(DecodeError::UnterminatedString { .. })));
    }

    #[test]
    fn position_is_range_checked() {
        let s = session(&[0; 4], 0);
        let mut c = s.root();
        c.set_position(4).unwrap();
        assert!(c.is_eof());
        assert_eq!(c.set_position(5), Err(DecodeError::InvalidPosition(5)));
    }

    #[test]
    fn take_carves_and_advances() {
        let s = session(b"headbody", 100);
        let mut c = s.root();
        c.skip(4).unwrap();
        let body = c.take(4).unwrap();
        assert_eq!((body.offset(), body.len()), (104, 4));
        assert_eq!(body.as_bytes(), b"body");
        assert!(c.is_eof());
        assert!(c.take(1).is_err());
    }

    #[test]
    fn marks_cover_exactly_the_last_read() {
        let s = session(b"\x07\0\0\0name\0", 0x40);
        let mut c = s.root();
        assert!(!c.mark_last_read("nothing read yet"));

        let v = c.read_marked(ReadKind::U32, "count: %d").unwrap();
        assert_eq!(v, Value::UInt(7));
        c.read_marked(ReadKind::CString, "name: %s").unwrap();

        let fields = s.finish().fields;
        let marks: Vec<_> = fields.marks().iter()
            .map(|m| (m.offset, m.len, m.description.as_str()))
            .collect();
        assert_eq!(marks, vec![(0x40, 4, "count: 7"), (0x44, 5, "name: name")]);
    }

    #[test]
    fn last_read_with_explicit_length() {
        let s = session(&[3, b'a', b'b', b'c', 0], 0x10);
        let mut c = s.root();
        assert!(!c.mark_last_read_len(2, "nothing read yet"));

        // A length prefix marked together with the string it announces.
        c.u8().unwrap();
        assert!(c.mark_last_read_len(4, "string"));
        assert!(!c.mark_last_read_len(0, "empty"));

        let fields = s.finish().fields;
        let marks: Vec<_> = fields.marks().iter()
            .map(|m| (m.offset, m.len, m.description.as_str()))
            .collect();
        assert_eq!(marks, vec![(0x10, 4, "string")]);
    }

    #[test]
    fn filters_feed_the_template() {
        let s = session(&[2, 1, 3], 0);
        let mut c = s.root();

        let raw = c
            .read_filtered(ReadKind::U8, "kind: %s (%d)", |v| {
                vec![Value::from("two"), v.clone()]
            })
            .unwrap();
        assert_eq!(raw, Value::UInt(2));

        // No values back means the raw value is formatted.
        c.read_filtered(ReadKind::U8, "raw: %d", |_| Vec::new()).unwrap();
        c.read_filtered(ReadKind::U8, "tripled: %d", |v| {
            vec![Value::UInt(v.as_u64().unwrap() * 3)]
        })
        .unwrap();

        let fields = s.finish().fields;
        let descriptions: Vec<_> = fields.marks().iter().map(|m| m.description.clone()).collect();
        assert_eq!(descriptions, ["kind: two (2)", "raw: 1", "tripled: 9"]);
    }

    #[test]
    fn whole_range_marks() {
        let s = session(&[0; 8], 0);
        let root = s.root();
        assert!(root.subrange(3, 4).mark("pair"));
        assert!(root.subrange(2, 5).mark_fmt("%d bytes", &[Value::UInt(4)]).unwrap());
        // An empty cursor cannot produce a mark.
        assert!(!root.subrange(4, 3).mark("nothing"));
    }
}
