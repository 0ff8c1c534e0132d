//! Highlight reconciliation.
//!
//! Turns the annotations of one anchor node into byte ranges of its plain text
//! and hands them to a [`RangeWrapper`] from the highest offset to the lowest.
//! Wrapping a range changes the text after it but never before it, so applying
//! in descending order keeps every pending range valid.

use tracing::debug;

use super::model::{ThreadAnnotation, ThreadId};
use super::occurrence::nth_occurrence;

/// A resolved highlight: `text[start..end]` belongs to thread `thread_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRange {
    pub thread_id: ThreadId,
    pub start: usize,
    pub end: usize,
}

impl HighlightRange {
    fn overlaps(&self, other: &HighlightRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Something that can mark a byte range of the text it was built from.
pub trait RangeWrapper {
    fn wrap(&mut self, range: &HighlightRange);
}

/// Resolves annotations against `full_text`.
///
/// Stale annotations (whose occurrence no longer exists) are skipped but not
/// touched. When two ranges overlap, the annotation listed first wins. The
/// result follows annotation order, not text order.
pub fn build_ranges(full_text: &str, annotations: &[ThreadAnnotation]) -> Vec<HighlightRange> {
    let mut ranges: Vec<HighlightRange> = Vec::with_capacity(annotations.len());

    for annotation in annotations {
        let Some(start) = nth_occurrence(
            full_text,
            &annotation.selection_text,
            annotation.match_index,
        ) else {
            debug!(
                thread = %annotation.id,
                match_index = annotation.match_index,
                "annotation does not resolve against anchor text; skipping"
            );
            continue;
        };

        let range = HighlightRange {
            thread_id: annotation.id.clone(),
            start,
            end: start + annotation.selection_text.len(),
        };

        if let Some(existing) = ranges.iter().find(|r| r.overlaps(&range)) {
            debug!(
                thread = %annotation.id,
                kept = %existing.thread_id,
                "overlapping highlight dropped"
            );
            continue;
        }
        ranges.push(range);
    }

    ranges
}

/// Applies `ranges` to `container` in descending start order.
pub fn apply_ranges<W: RangeWrapper + ?Sized>(container: &mut W, ranges: &[HighlightRange]) {
    let mut ordered: Vec<&HighlightRange> = ranges.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));
    for range in ordered {
        container.wrap(range);
    }
}

/// A string container that wraps ranges with textual markers.
///
/// It edits the string in place, so offsets after a wrapped range shift; use
/// it through [`apply_ranges`].
#[derive(Debug, Clone)]
pub struct MarkupWrapper {
    text: String,
    open: String,
    close: String,
}

impl MarkupWrapper {
    pub fn new(text: impl Into<String>, open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            open: open.into(),
            close: close.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl RangeWrapper for MarkupWrapper {
    fn wrap(&mut self, range: &HighlightRange) {
        let valid = range.start <= range.end
            && range.end <= self.text.len()
            && self.text.is_char_boundary(range.start)
            && self.text.is_char_boundary(range.end);
        if !valid {
            debug!(
                start = range.start,
                end = range.end,
                "range outside markup text; skipping"
            );
            return;
        }
        self.text.insert_str(range.end, &self.close);
        self.text.insert_str(range.start, &self.open);
    }
}

/// Convenience: resolve and apply in one step, returning the marked-up text.
pub fn markup(full_text: &str, annotations: &[ThreadAnnotation], open: &str, close: &str) -> String {
    let ranges = build_ranges(full_text, annotations);
    let mut wrapper = MarkupWrapper::new(full_text, open, close);
    apply_ranges(&mut wrapper, &ranges);
    wrapper.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::NodeId;

    fn annotation(selection: &str, index: usize) -> ThreadAnnotation {
        ThreadAnnotation::draft(NodeId::from("anchor"), selection, index)
    }

    fn range(start: usize, end: usize) -> HighlightRange {
        HighlightRange {
            thread_id: ThreadId::generate(),
            start,
            end,
        }
    }

    #[test]
    fn test_build_ranges_resolves_match_index() {
        let text = "cat sat cat";
        let second = annotation("cat", 1);
        let ranges = build_ranges(text, std::slice::from_ref(&second));

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].thread_id, second.id);
        assert_eq!((ranges[0].start, ranges[0].end), (8, 11));
    }

    #[test]
    fn test_build_ranges_skips_stale_annotations() {
        let text = "cat sat cat";
        let annotations = vec![annotation("cat", 5), annotation("dog", 0), annotation("sat", 0)];
        let ranges = build_ranges(text, &annotations);

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].thread_id, annotations[2].id);
    }

    #[test]
    fn test_build_ranges_drops_later_overlap() {
        let text = "the quick brown fox";
        let annotations = vec![annotation("quick brown", 0), annotation("brown fox", 0)];
        let ranges = build_ranges(text, &annotations);

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].thread_id, annotations[0].id);
    }

    #[test]
    fn test_adjacent_ranges_are_both_kept() {
        let text = "abcdef";
        let annotations = vec![annotation("abc", 0), annotation("def", 0)];
        assert_eq!(markup(text, &annotations, "<", ">"), "<abc><def>");
    }

    #[test]
    fn test_descending_application_matches_original_offsets() {
        let text = "0123456789abcdefghijklmnopqrstuvwxyz";
        let ranges = vec![range(5, 8), range(20, 24)];

        let mut wrapper = MarkupWrapper::new(text, "[", "]");
        apply_ranges(&mut wrapper, &ranges);

        let expected = format!(
            "{}[{}]{}[{}]{}",
            &text[..5],
            &text[5..8],
            &text[8..20],
            &text[20..24],
            &text[24..]
        );
        assert_eq!(wrapper.as_str(), expected);
    }

    #[test]
    fn test_ascending_application_corrupts_later_ranges() {
        let text = "0123456789abcdefghijklmnopqrstuvwxyz";
        let ranges = vec![range(5, 8), range(20, 24)];

        let mut descending = MarkupWrapper::new(text, "[", "]");
        apply_ranges(&mut descending, &ranges);

        // Wrapping the lower range first shifts the text under the second one.
        let mut ascending = MarkupWrapper::new(text, "[", "]");
        for r in &ranges {
            ascending.wrap(r);
        }

        assert_ne!(ascending.as_str(), descending.as_str());
        assert!(ascending.as_str().contains("[ijkl]"));
        assert!(descending.as_str().contains("[klmn]"));
    }

    #[test]
    fn test_markup_ignores_order_of_input() {
        let text = "one two three two one";
        let annotations = vec![annotation("one", 1), annotation("two", 0), annotation("one", 0)];

        assert_eq!(
            markup(text, &annotations, "<", ">"),
            "<one> <two> three two <one>"
        );
    }
}
