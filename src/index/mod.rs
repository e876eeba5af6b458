//! The flattened field map and its offset queries.
//!
//! [`FieldMap`] is produced once by [`flatten`](crate::flatten::flatten) and is
//! read-only afterwards.  Span starts are strictly increasing, so every query
//! is a binary search.

use std::ops::Range;

use serde::Serialize;

use crate::marks::Mark;

/// A maximal byte range over which the set of active marks is constant.
/// It extends up to the next span's start, or to the end of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    /// `None` for gaps between fields.
    pub color: Option<u8>,
    /// Where this span's marks sit in `FieldMap::entries`.
    first:     usize,
    count:     usize,
}

impl Span {
    pub(crate) fn gap(start: u64) -> Self {
        Self { start, color: None, first: 0, count: 0 }
    }

    pub(crate) fn marked(start: u64, color: u8, first: usize, count: usize) -> Self {
        Self { start, color: Some(color), first, count }
    }

    pub fn is_gap(&self) -> bool {
        self.count == 0
    }
}

/// Borrowed view of one span, with its end resolved and marks looked up.
#[derive(Debug, Clone, Serialize)]
pub struct SpanView<'a> {
    pub start: u64,
    pub end:   u64,
    pub color: Option<u8>,
    pub marks: Vec<&'a Mark>,
}

/// Which way [`FieldMap::navigate`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    range:   Range<u64>,
    /// Clipped marks in sweep order.
    marks:   Vec<Mark>,
    /// Indices into `marks`, grouped per span.
    entries: Vec<usize>,
    spans:   Vec<Span>,
}

impl FieldMap {
    pub(crate) fn from_parts(
        range:   Range<u64>,
        marks:   Vec<Mark>,
        entries: Vec<usize>,
        spans:   Vec<Span>,
    ) -> Self {
        Self { range, marks, entries, spans }
    }

    /// The absolute range the spans partition.
    pub fn range(&self) -> Range<u64> { self.range.clone() }

    pub fn spans(&self) -> &[Span] { &self.spans }

    pub fn len(&self) -> usize { self.spans.len() }

    pub fn is_empty(&self) -> bool { self.spans.is_empty() }

    /// Every mark that made it into the map, sorted by offset.
    pub fn marks(&self) -> &[Mark] { &self.marks }

    /// One past the last offset covered by span `index`.
    pub fn span_end(&self, index: usize) -> u64 {
        self.spans.get(index + 1).map_or(self.range.end, |s| s.start)
    }

    /// Marks active over span `index`, outermost first.
    pub fn span_marks(&self, index: usize) -> impl Iterator<Item = &Mark> + '_ {
        let entries = self
            .spans
            .get(index)
            .map_or(&[][..], |s| &self.entries[s.first..s.first + s.count]);
        entries.iter().map(move |&i| &self.marks[i])
    }

    pub fn view(&self, index: usize) -> Option<SpanView<'_>> {
        let span = self.spans.get(index)?;
        Some(SpanView {
            start: span.start,
            end:   self.span_end(index),
            color: span.color,
            marks: self.span_marks(index).collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = SpanView<'_>> + '_ {
        (0..self.spans.len()).filter_map(move |i| self.view(i))
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Index of the span covering `offset`: the last one starting at or
    /// before it.  `None` when `offset` precedes every span.
    pub fn find_span_index(&self, offset: u64) -> Option<usize> {
        self.spans.partition_point(|s| s.start <= offset).checked_sub(1)
    }

    /// Marks active at `offset`; empty for gaps and outside the store.
    pub fn marks_at(&self, offset: u64) -> Vec<&Mark> {
        if !self.range.contains(&offset) {
            return Vec::new();
        }
        match self.find_span_index(offset) {
            Some(i) => self.span_marks(i).collect(),
            None    => Vec::new(),
        }
    }

    /// Start of the neighbouring span in `direction`, marked or not.
    ///
    /// Moving back from inside a span lands on its own start first; moving
    /// back from a span's start lands on the previous span.  Returns `None`
    /// when there is nowhere to go.
    pub fn navigate(&self, offset: u64, direction: Direction) -> Option<u64> {
        let found = self.find_span_index(offset);
        let target = match direction {
            Direction::Next => found.map_or(0, |i| i + 1),
            Direction::Prev => {
                let i = found?;
                if self.spans[i].start == offset { i.checked_sub(1)? } else { i }
            }
        };
        self.spans.get(target).map(|s| s.start)
    }
}
