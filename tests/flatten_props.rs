use hexmark::flatten::{flatten, COLOR_COUNT};
use hexmark::index::Direction;
use hexmark::marks::Mark;
use proptest::prelude::*;
use std::ops::Range;

fn arb_marks() -> impl Strategy<Value = Vec<Mark>> {
    prop::collection::vec((0u64..80, 1u64..24), 0..24).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (offset, len))| Mark { offset, len, description: format!("m{i}") })
            .collect()
    })
}

fn arb_range() -> impl Strategy<Value = Range<u64>> {
    (0u64..16, 0u64..80).prop_map(|(start, extra)| start..start + extra)
}

fn active(marks: &[Mark], offset: u64) -> Vec<String> {
    let mut names: Vec<String> = marks
        .iter()
        .filter(|m| m.offset <= offset && offset < m.end())
        .map(|m| m.description.clone())
        .collect();
    names.sort();
    names
}

proptest! {
    /// Spans partition the range: the first starts at its start, starts
    /// strictly increase, and none starts at or past its end.
    #[test]
    fn spans_cover_the_range(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks, range.clone());
        let starts: Vec<u64> = map.spans().iter().map(|s| s.start).collect();

        if range.is_empty() {
            prop_assert!(starts.is_empty());
        } else {
            prop_assert_eq!(starts[0], range.start);
        }
        prop_assert!(starts.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(starts.iter().all(|&s| s < range.end));
    }

    /// Every offset in the range sees exactly the marks containing it.
    #[test]
    fn lookups_match_containment(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks.clone(), range.clone());
        for offset in range.clone() {
            let mut found: Vec<String> =
                map.marks_at(offset).iter().map(|m| m.description.clone()).collect();
            found.sort();
            prop_assert_eq!(found, active(&marks, offset), "offset {}", offset);
        }
        prop_assert!(map.marks_at(range.end).is_empty());
    }

    /// Marked spans take colors in cycle order; gaps take none.
    #[test]
    fn colors_cycle_over_marked_spans(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks, range);
        let mut expected = 0u8;
        for span in map.spans() {
            if span.is_gap() {
                prop_assert_eq!(span.color, None);
            } else {
                prop_assert_eq!(span.color, Some(expected));
                expected = (expected + 1) % COLOR_COUNT;
            }
        }
    }

    /// Neighbouring spans never carry the same set of marks.
    #[test]
    fn spans_are_maximal(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks, range);
        let sets: Vec<Vec<&str>> = map
            .iter()
            .map(|v| v.marks.iter().map(|m| m.description.as_str()).collect())
            .collect();
        prop_assert!(sets.windows(2).all(|w| w[0] != w[1]));
    }

    /// Marks outside the range are dropped, the rest are clipped into it.
    #[test]
    fn marks_are_clipped(marks in arb_marks(), range in arb_range()) {
        let overlapping = marks
            .iter()
            .filter(|m| m.offset < range.end && m.end() > range.start)
            .count();
        let map = flatten(marks, range.clone());
        prop_assert_eq!(map.marks().len(), overlapping);
        for m in map.marks() {
            prop_assert!(range.start <= m.offset && m.end() <= range.end);
        }
    }

    /// Every offset in the range resolves to the span containing it.
    #[test]
    fn find_span_index_brackets_the_offset(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks, range.clone());
        for offset in range.clone() {
            let i = map.find_span_index(offset);
            prop_assert!(i.is_some(), "offset {} has no span", offset);
            let i = i.unwrap();
            prop_assert!(map.spans()[i].start <= offset && offset < map.span_end(i), "offset {}", offset);
        }
    }

    /// Stepping forward from a span start lands on the next span's start,
    /// and stepping back undoes it.
    #[test]
    fn navigation_walks_span_starts(marks in arb_marks(), range in arb_range()) {
        let map = flatten(marks, range);
        let starts: Vec<u64> = map.spans().iter().map(|s| s.start).collect();
        for (i, &start) in starts.iter().enumerate() {
            prop_assert_eq!(map.navigate(start, Direction::Next), starts.get(i + 1).copied());
            let prev = i.checked_sub(1).map(|p| starts[p]);
            prop_assert_eq!(map.navigate(start, Direction::Prev), prev);
        }
    }
}
