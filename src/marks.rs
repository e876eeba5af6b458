use serde::Serialize;

/// A labeled byte range `[offset, offset + len)` in absolute offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mark {
    pub offset:      u64,
    pub len:         u64,
    pub description: String,
}

impl Mark {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len)
    }
}

/// Append-only collection of marks gathered during a decode pass.
#[derive(Debug, Clone, Default)]
pub struct MarkStore {
    marks: Vec<Mark>,
}

impl MarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mark.  Empty and negative lengths are dropped since they
    /// would open and close at the same sweep position; returns whether the
    /// mark was kept.
    pub fn add(&mut self, offset: u64, len: i64, description: impl Into<String>) -> bool {
        if len <= 0 {
            tracing::trace!(offset, len, "dropping empty mark");
            return false;
        }
        self.marks.push(Mark { offset, len: len as u64, description: description.into() });
        true
    }

    pub fn len(&self) -> usize { self.marks.len() }

    pub fn is_empty(&self) -> bool { self.marks.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Mark> { self.marks.iter() }

    /// Forget everything recorded so far; returns how many marks were lost.
    pub fn discard(&mut self) -> usize {
        std::mem::take(&mut self.marks).len()
    }

    pub fn into_marks(self) -> Vec<Mark> { self.marks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_marks_are_dropped() {
        let mut store = MarkStore::new();
        assert!(!store.add(0, 0, "zero"));
        assert!(!store.add(0, -3, "negative"));
        assert!(store.add(4, 2, "kept"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().map(Mark::end), Some(6));
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut store = MarkStore::new();
        store.add(8, 1, "b");
        store.add(0, 1, "a");
        let names: Vec<_> = store.into_marks().into_iter().map(|m| m.description).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
