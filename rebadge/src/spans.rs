///
/// Byte ranges inside the remainder which later passes must not modify.
///
/// Normalized date ranges and prefix-bound dates are written once and then carried through
/// the remaining passes verbatim. The spans are tracked beside the remainder rather than with
/// sentinel markers inside it, so the remainder is always real text.
///

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize, // exclusive
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

#[derive(Clone, Debug, Default)]
pub struct Protections {
    spans: Vec<Span>, // kept sorted by start, non-overlapping
}

impl Protections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, span: Span) {
        let insert_at = self.spans.iter().position(|s| s.start > span.start).unwrap_or(self.spans.len());
        self.spans.insert(insert_at, span);
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.spans.iter().any(|span| span.overlaps(start, end))
    }

    pub fn is_protected(&self, pos: usize) -> bool {
        self.spans.iter().any(|span| span.contains(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    ///
    /// Record that [start, end) in the tracked text was replaced by new_len bytes.
    ///
    /// Spans beyond the edit shift to keep pointing at the same text. The edit must not
    /// overlap any protected span - mutators check overlaps() before editing.
    ///
    pub fn apply_edit(&mut self, start: usize, end: usize, new_len: usize) {
        debug_assert!(!self.overlaps(start, end), "edit [{}, {}) overlaps a protected span", start, end);

        let old_len = end - start;
        for span in &mut self.spans {
            if span.start >= end {
                span.start = span.start + new_len - old_len;
                span.end = span.end + new_len - old_len;
            }
        }
    }

    ///
    /// Fold another set of spans in at the given byte offset (used when per-segment results
    /// are stitched back into a full path string).
    ///
    pub fn merge(&mut self, other: Protections, offset: usize) {
        for span in other.spans {
            self.add(Span::new(span.start + offset, span.end + offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_exclusive_of_end() {
        let span = Span::new(5, 10);

        assert!(span.overlaps(9, 12));
        assert!(span.overlaps(0, 6));
        assert!(!span.overlaps(10, 12));
        assert!(!span.overlaps(0, 5));
    }

    #[test]
    fn edits_before_a_span_shift_it() {
        let mut protections = Protections::new();
        protections.add(Span::new(10, 20));

        // Replace [0, 4) with 1 byte: the span moves left by 3.
        protections.apply_edit(0, 4, 1);
        assert_eq!(protections.iter().next(), Some(&Span::new(7, 17)));

        // Growing an earlier region moves it right again.
        protections.apply_edit(0, 1, 4);
        assert_eq!(protections.iter().next(), Some(&Span::new(10, 20)));
    }

    #[test]
    fn edits_after_a_span_leave_it_alone() {
        let mut protections = Protections::new();
        protections.add(Span::new(0, 5));

        protections.apply_edit(5, 9, 0);
        assert_eq!(protections.iter().next(), Some(&Span::new(0, 5)));
    }

    #[test]
    fn merge_offsets_incoming_spans() {
        let mut outer = Protections::new();
        outer.add(Span::new(0, 2));

        let mut inner = Protections::new();
        inner.add(Span::new(1, 3));

        outer.merge(inner, 10);
        assert!(outer.is_protected(11));
        assert!(!outer.is_protected(13));
    }
}
