//! Literal substring occurrences.
//!
//! All positions are byte offsets into the searched text. Matches never
//! overlap: after a match the search resumes at its end (`"aaa"` contains
//! `"aa"` once).

/// Returns the start offset of every non-overlapping occurrence of `needle`.
///
/// An empty needle has no occurrences.
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    haystack.match_indices(needle).map(|(start, _)| start).collect()
}

/// Returns the start offset of the `index`-th occurrence of `needle`.
pub fn nth_occurrence(haystack: &str, needle: &str, index: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .match_indices(needle)
        .nth(index)
        .map(|(start, _)| start)
}

/// Picks the occurrence of `selection` closest to `approximate_offset`.
///
/// Returns an index into the occurrence list. Ties go to the earlier
/// occurrence, and `0` is returned when there is no occurrence at all.
pub fn resolve_occurrence(full_text: &str, selection: &str, approximate_offset: usize) -> usize {
    find_occurrences(full_text, selection)
        .iter()
        .enumerate()
        .min_by_key(|(_, start)| start.abs_diff(approximate_offset))
        .map_or(0, |(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_occurrences_is_non_overlapping() {
        assert_eq!(find_occurrences("cat sat cat", "cat"), vec![0, 8]);
        assert_eq!(find_occurrences("aaaa", "aa"), vec![0, 2]);
        assert!(find_occurrences("cat", "").is_empty());
        assert!(find_occurrences("cat", "dog").is_empty());
    }

    #[test]
    fn test_resolve_occurrence_picks_closest() {
        assert_eq!(resolve_occurrence("cat sat cat", "cat", 7), 1);
        assert_eq!(resolve_occurrence("cat sat cat", "cat", 1), 0);
        assert_eq!(resolve_occurrence("cat sat cat", "cat", 100), 1);
    }

    #[test]
    fn test_resolve_occurrence_tie_prefers_earlier() {
        // Occurrences at 0 and 8; offset 4 is equidistant.
        assert_eq!(resolve_occurrence("cat sat cat", "cat", 4), 0);
    }

    #[test]
    fn test_resolve_occurrence_without_match_is_zero() {
        assert_eq!(resolve_occurrence("cat sat cat", "dog", 5), 0);
        assert_eq!(resolve_occurrence("cat sat cat", "", 5), 0);
    }

    #[test]
    fn test_nth_occurrence_uses_byte_offsets() {
        let text = "héllo wörld héllo";
        assert_eq!(nth_occurrence(text, "héllo", 0), Some(0));
        assert_eq!(nth_occurrence(text, "héllo", 1), Some(14));
        assert_eq!(nth_occurrence(text, "héllo", 2), None);
    }
}
