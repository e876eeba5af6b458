//! Flattens possibly overlapping marks into sequential, non-overlapping spans
//! suitable for lookup by offset, assigning colors in the process:
//!
//! ```text
//!  ________    _______     ___
//! |________|__|_______|   |___|
//!     |_________|
//!  ___ ____ __ _ _____ ___ ___
//! |___|____|__|_|_____|___|___|
//! ```
//!
//! A single ascending sweep over mark boundaries is enough: each span is a
//! maximal run over which the set of open marks does not change.

use std::ops::Range;

use tracing::debug;

use crate::index::{FieldMap, Span};
use crate::marks::Mark;

/// Field colors cycle through this many values.
pub const COLOR_COUNT: u8 = 4;

/// Partition `range` by the marks covering it.
///
/// Marks are clipped to `range`; those entirely outside are dropped.  Gaps
/// become uncolored spans with no marks, and only marked spans advance the
/// color cycle, so neighbouring fields never share a color because of a gap
/// between them.
pub fn flatten(marks: Vec<Mark>, range: Range<u64>) -> FieldMap {
    let total = marks.len();
    let mut marks: Vec<Mark> = marks
        .into_iter()
        .filter_map(|m| {
            let start = m.offset.max(range.start);
            let end = m.end().min(range.end);
            (start < end).then(|| Mark { offset: start, len: end - start, ..m })
        })
        .collect();

    // Longer marks first at equal offsets: they contain the shorter ones.
    marks.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.len.cmp(&a.len)));

    let mut spans: Vec<Span> = Vec::new();
    let mut entries: Vec<usize> = Vec::new();

    if marks.first().map_or(range.start < range.end, |m| m.offset > range.start) {
        spans.push(Span::gap(range.start));
    }

    let mut current: Vec<usize> = Vec::new();
    let mut next = 0;
    let mut color = 0;
    while !current.is_empty() || next < marks.len() {
        let mut closest = marks.get(next).map_or(range.end, |m| m.offset);
        for &i in &current {
            closest = closest.min(marks[i].end());
        }

        current.retain(|&i| marks[i].end() != closest);
        while next < marks.len() && marks[next].offset == closest {
            current.push(next);
            next += 1;
        }

        if current.is_empty() {
            if closest < range.end {
                spans.push(Span::gap(closest));
            }
        } else {
            let first = entries.len();
            entries.extend_from_slice(&current);
            spans.push(Span::marked(closest, color, first, current.len()));
            color = (color + 1) % COLOR_COUNT;
        }
    }

    debug!(
        marks = total,
        kept = marks.len(),
        spans = spans.len(),
        "flattened marks"
    );
    FieldMap::from_parts(range, marks, entries, spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(offset: u64, len: u64, description: &str) -> Mark {
        Mark { offset, len, description: description.to_owned() }
    }

    /// `(start, descriptions, color)` per span.
    fn layout(map: &FieldMap) -> Vec<(u64, Vec<&str>, Option<u8>)> {
        map.iter()
            .map(|s| {
                let names = s.marks.iter().map(|m| m.description.as_str()).collect();
                (s.start, names, s.color)
            })
            .collect()
    }

    #[test]
    fn header_layout() {
        let map = flatten(
            vec![
                mark(0, 4, "magic"),
                mark(4, 2, "version"),
                mark(4, 4, "flags"),
                mark(10, 1, "checksum"),
            ],
            0..16,
        );
        assert_eq!(
            layout(&map),
            vec![
                (0, vec!["magic"], Some(0)),
                (4, vec!["flags", "version"], Some(1)),
                (6, vec!["flags"], Some(2)),
                (8, vec![], None),
                (10, vec!["checksum"], Some(3)),
                (11, vec![], None),
            ]
        );
    }

    #[test]
    fn no_marks_is_one_gap() {
        let map = flatten(Vec::new(), 10..20);
        assert_eq!(layout(&map), vec![(10, vec![], None)]);

        let map = flatten(Vec::new(), 10..10);
        assert!(map.is_empty());
    }

    #[test]
    fn leading_gap_and_flush_end() {
        let map = flatten(vec![mark(4, 4, "tail")], 0..8);
        // No empty span at the very end: it would cover nothing.
        assert_eq!(layout(&map), vec![(0, vec![], None), (4, vec!["tail"], Some(0))]);
    }

    #[test]
    fn colors_wrap_and_skip_gaps() {
        let marks = (0..6).map(|i| mark(i * 2, 1, "f")).collect();
        let map = flatten(marks, 0..12);
        let colors: Vec<_> = map.iter().map(|s| s.color).collect();
        assert_eq!(
            colors,
            [Some(0), None, Some(1), None, Some(2), None, Some(3), None, Some(0), None, Some(1), None]
        );
    }

    #[test]
    fn identical_marks_share_a_span() {
        let map = flatten(vec![mark(2, 2, "a"), mark(2, 2, "b")], 0..4);
        assert_eq!(
            layout(&map),
            vec![(0, vec![], None), (2, vec!["a", "b"], Some(0))]
        );
    }

    #[test]
    fn nested_marks_reopen_the_container() {
        let map = flatten(vec![mark(0, 10, "outer"), mark(3, 2, "inner")], 0..10);
        assert_eq!(
            layout(&map),
            vec![
                (0, vec!["outer"], Some(0)),
                (3, vec!["outer", "inner"], Some(1)),
                (5, vec!["outer"], Some(2)),
            ]
        );
    }

    #[test]
    fn marks_are_clipped_to_the_store() {
        let map = flatten(
            vec![mark(0, 8, "straddles"), mark(20, 4, "outside"), mark(14, 10, "overhangs")],
            4..16,
        );
        assert_eq!(
            layout(&map),
            vec![
                (4, vec!["straddles"], Some(0)),
                (8, vec![], None),
                (14, vec!["overhangs"], Some(1)),
            ]
        );
        assert_eq!(map.marks().len(), 2);
    }
}
