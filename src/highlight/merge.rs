use crate::transcript::Highlight;

/// Merges `candidates` into an already sorted, non-overlapping `existing` list.
///
/// Candidates are taken in order; one is kept only if it overlaps nothing
/// accepted so far (existing spans and earlier candidates). Losers are dropped
/// silently. The result is sorted by `start`.
pub fn merge_spans(existing: &[Highlight], candidates: &[Highlight]) -> Vec<Highlight> {
    merge_spans_counted(existing, candidates).0
}

/// Same as [`merge_spans`], also returning how many candidates were accepted.
pub fn merge_spans_counted(
    existing: &[Highlight],
    candidates: &[Highlight],
) -> (Vec<Highlight>, usize) {
    let mut merged = existing.to_vec();
    let mut accepted = 0usize;

    for candidate in candidates {
        if merged.iter().any(|span| candidate.overlaps(span)) {
            continue;
        }
        merged.push(candidate.clone());
        accepted += 1;
    }

    // stable: equal starts keep insertion order
    merged.sort_by_key(|span| span.start);
    (merged, accepted)
}
